use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use anyhow::{Result, anyhow};

use crate::{
    http::{Request, Response, Transport},
    station::SerialLink,
};

/// Records requests and replays queued responses, falling back to `fallback` when the queue is empty.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug)]
struct MockState {
    requests: Vec<Request>,
    responses: VecDeque<Result<Response, String>>,
    fallback: Response,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                requests: Vec::new(),
                responses: VecDeque::new(),
                fallback: Response {
                    status: 200,
                    body: b"{}".to_vec(),
                },
            })),
        }
    }

    pub fn push_response(&self, status: u16, body: &str) {
        self.state.lock().unwrap().responses.push_back(Ok(Response {
            status,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn push_error(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(Err(message.to_owned()));
    }

    pub fn set_fallback(&self, status: u16, body: &str) {
        self.state.lock().unwrap().fallback = Response {
            status,
            body: body.as_bytes().to_vec(),
        };
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn json_bodies(&self) -> Vec<serde_json::Value> {
        self.requests()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);
        match state.responses.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(state.fallback.clone()),
        }
    }
}

/// Serial link fed from a byte script. Reads past the end of the script time
/// out; `clear_input` only counts calls so the rest of the script stays readable.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLink {
    state: Arc<Mutex<LinkState>>,
}

#[derive(Debug, Default)]
struct LinkState {
    input: VecDeque<u8>,
    written: Vec<u8>,
    clears: usize,
}

impl ScriptedLink {
    pub fn new(input: &[u8]) -> Self {
        let link = Self::default();
        link.state.lock().unwrap().input.extend(input);
        link
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().written.clone()
    }

    pub fn clears(&self) -> usize {
        self.state.lock().unwrap().clears
    }
}

impl io::Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.input.is_empty() {
            drop(state);
            thread::sleep(Duration::from_millis(5));
            return Err(io::ErrorKind::TimedOut.into());
        }

        let n = buf.len().min(state.input.len());
        for (slot, byte) in buf.iter_mut().zip(state.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl io::Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.lock().unwrap().written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for ScriptedLink {
    fn clear_input(&mut self) -> Result<()> {
        self.state.lock().unwrap().clears += 1;
        Ok(())
    }
}

/// Valid SDS011 frame for `command` carrying `payload`.
pub fn sds011_frame(command: u8, payload: [u8; 6]) -> [u8; 10] {
    let checksum = payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    let mut frame = [0xaa, command, 0, 0, 0, 0, 0, 0, checksum, 0xab];
    frame[2..8].copy_from_slice(&payload);
    frame
}
