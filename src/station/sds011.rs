use std::{
    io::{self, Read, Write},
    time::Duration,
};

use anyhow::{Context as _, Result, anyhow, bail};
use serialport::{ClearBuffer, SerialPort};

// Ref: Nova Fitness SDS011 Laser Dust Sensor Control Protocol V1.3
const FRAME_HEAD: u8 = 0xaa;
const FRAME_TAIL: u8 = 0xab;
const DATA_FRAME_COMMAND: u8 = 0xc0;
const REPLY_FRAME_COMMAND: u8 = 0xc5;
const QUERY_COMMAND: u8 = 0xb4;
const WORKING_PERIOD_REQUEST: u8 = 0x08;
const FRAME_LEN: usize = 10;
const COMMAND_LEN: usize = 19;

const BAUD_RATE: u32 = 9600;
const READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmSample {
    pub pm25: f32,
    pub pm10: f32,
}

/// Byte stream to the sensor. Reads time out with `ErrorKind::TimedOut`
/// when the sensor stays silent.
pub trait SerialLink: Read + Write + Send {
    fn clear_input(&mut self) -> Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> Result<()> {
        self.clear(ClearBuffer::Input)
            .context("failed to clear serial input buffer")
    }
}

pub struct Sds011<L = Box<dyn SerialPort>> {
    link: L,
}

impl Sds011 {
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .flow_control(serialport::FlowControl::None)
            .open()
            .with_context(|| format!("failed to open serial port {path}"))?;

        let mut sensor = Self::new(port);
        sensor.clear_input()?;

        Ok(sensor)
    }
}

impl<L: SerialLink> Sds011<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn clear_input(&mut self) -> Result<()> {
        self.link.clear_input()
    }

    /// Sets the duty cycle: one sample every `minutes` minutes, 0 for continuous.
    pub fn set_working_period(&mut self, minutes: u8) -> Result<()> {
        self.link
            .write_all(&working_period_command(minutes))
            .context("failed to write working period command")?;
        self.link.flush().context("failed to flush serial port")
    }

    /// Reads the next data frame. Returns `Ok(None)` when the sensor stayed
    /// silent for the read timeout.
    pub fn read_sample(&mut self) -> Result<Option<PmSample>> {
        loop {
            let mut head = [0u8; 1];
            match self.link.read_exact(&mut head) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e).context("failed to read serial port"),
            }
            if head[0] != FRAME_HEAD {
                continue;
            }

            let mut frame = [0u8; FRAME_LEN];
            frame[0] = FRAME_HEAD;
            self.link
                .read_exact(&mut frame[1..])
                .context("failed to read SDS011 frame")?;

            if let Some(sample) = decode_frame(&frame)? {
                return Ok(Some(sample));
            }
        }
    }
}

/// Decodes a 10-byte frame. Command replies decode to `None`.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<Option<PmSample>> {
    if frame[0] != FRAME_HEAD || frame[9] != FRAME_TAIL {
        bail!("malformed SDS011 frame: {frame:02x?}");
    }

    let checksum = checksum(&frame[2..8]);
    if checksum != frame[8] {
        bail!(
            "SDS011 frame checksum mismatch: expected 0x{checksum:02x}, got 0x{:02x}",
            frame[8]
        );
    }

    match frame[1] {
        DATA_FRAME_COMMAND => {
            let pm25 = u16::from_le_bytes([frame[2], frame[3]]);
            let pm10 = u16::from_le_bytes([frame[4], frame[5]]);
            Ok(Some(PmSample {
                pm25: pm25 as f32 / 10.0,
                pm10: pm10 as f32 / 10.0,
            }))
        }
        REPLY_FRAME_COMMAND => Ok(None),
        command => Err(anyhow!("unknown SDS011 frame command: 0x{command:02x}")),
    }
}

pub fn working_period_command(minutes: u8) -> [u8; COMMAND_LEN] {
    let mut command = [0u8; COMMAND_LEN];
    command[0] = FRAME_HEAD;
    command[1] = QUERY_COMMAND;
    command[2] = WORKING_PERIOD_REQUEST;
    command[3] = 0x01; // set
    command[4] = minutes;
    // broadcast to any device id
    command[15] = 0xff;
    command[16] = 0xff;
    command[17] = checksum(&command[2..17]);
    command[18] = FRAME_TAIL;
    command
}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}
