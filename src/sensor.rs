//! Orientation samples from a serial device.
//!
//! The device answers each `x\n` request with one line `heading,roll,pitch` in degrees.

use glam::{EulerRot, Quat};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::ops::ControlFlow;
use std::num::ParseFloatError;
use thiserror::Error;

/// Request for the next sample.
pub const REQUEST: &[u8] = b"x\n";

/// Device orientation in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Orientation {
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Orientation {
    /// Heading about Y, pitch about X, roll about Z.
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.heading.to_radians(),
            self.pitch.to_radians(),
            self.roll.to_radians(),
        )
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("expected 3 fields, got {0}")]
    Fields(usize),
    #[error("field {field} is not a number: {source}")]
    Number {
        field: usize,
        source: ParseFloatError,
    },
}

/// Parse one `heading,roll,pitch` line. Fields past the third are ignored.
pub fn parse_line(line: &str) -> Result<Orientation, SampleError> {
    let fields: Vec<&str> = line.trim().split(',').collect();
    if fields.len() < 3 {
        return Err(SampleError::Fields(fields.len()));
    }
    let mut values = [0.0f32; 3];
    for (field, (value, text)) in values.iter_mut().zip(&fields).enumerate() {
        *value = text
            .trim()
            .parse()
            .map_err(|source| SampleError::Number { field, source })?;
    }
    let [heading, roll, pitch] = values;
    Ok(Orientation {
        heading,
        pitch,
        roll,
    })
}

/// Request-response loop over a serial port or anything shaped like one.
pub struct OrientationPoller<T: Read + Write> {
    port: BufReader<T>,
}

impl<T: Read + Write> OrientationPoller<T> {
    pub fn new(port: T) -> Self {
        Self {
            port: BufReader::new(port),
        }
    }

    fn request(&mut self) -> bool {
        let port = self.port.get_mut();
        match port.write_all(REQUEST).and_then(|_| port.flush()) {
            Ok(()) => true,
            Err(err) => {
                log::error!("sensor request failed: {err}");
                false
            }
        }
    }

    /// Poll until the device stops answering or `on_sample` breaks, handing each sample over.
    ///
    /// A new request goes out after every line, parsed or not. Malformed lines, including
    /// ones that are not UTF-8, are skipped; read timeouts are retried. Returns the number of
    /// samples delivered.
    pub fn run(&mut self, mut on_sample: impl FnMut(Orientation) -> ControlFlow<()>) -> usize {
        let mut delivered = 0;
        let mut line = Vec::new();

        if !self.request() {
            return delivered;
        }
        loop {
            match self.port.read_until(b'\n', &mut line) {
                Ok(0) => {
                    log::info!("sensor closed after {delivered} samples");
                    break;
                }
                Ok(_) => {}
                Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::TimedOut) => {
                    log::trace!("sensor read retried: {err}");
                    continue;
                }
                Err(err) => {
                    log::error!("sensor read failed: {err}");
                    break;
                }
            }

            let decoded = String::from_utf8_lossy(&line);
            let text = decoded.trim();
            if !text.is_empty() {
                match parse_line(text) {
                    Ok(sample) => {
                        log::trace!("orientation {sample:?}");
                        delivered += 1;
                        if on_sample(sample).is_break() {
                            log::info!("sensor consumer gone after {delivered} samples");
                            break;
                        }
                    }
                    Err(err) => log::debug!("skipping sensor line '{text}': {err}"),
                }
            }
            line.clear();

            if !self.request() {
                break;
            }
        }
        delivered
    }

    pub fn into_inner(self) -> T {
        self.port.into_inner()
    }
}
