pub mod correction;
pub mod esp;
pub mod exec;
pub mod feeder;
pub mod heater;
pub mod http;
pub mod measurement;
pub mod publisher;
pub mod runner;
pub mod station;
pub mod token;

#[cfg(test)]
mod testing;
