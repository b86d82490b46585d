use image::{ImageBuffer, RgbImage};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::device::{CaptureDevice, Constraints, DeviceProvider};
use crate::error::{CaptureError, DeviceError};

const RGB3: &[u8; 4] = b"RGB3";
const YUYV: &[u8; 4] = b"YUYV";
const GREY: &[u8; 4] = b"GREY";

/// Opens V4L2 devices by path (e.g. `/dev/video0`).
#[derive(Debug, Clone)]
pub struct V4lProvider {
    path: String,
}

impl V4lProvider {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl DeviceProvider for V4lProvider {
    fn open(&self, constraints: &Constraints) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        Ok(Box::new(V4lCamera::open(&self.path, constraints)?))
    }
}

pub struct V4lCamera {
    path: String,
    device: Device,
    stream: Option<Stream<'static>>,
}

impl V4lCamera {
    pub fn open(path: &str, constraints: &Constraints) -> Result<Self, DeviceError> {
        let device = Device::with_path(path).map_err(|e| DeviceError::from_open(path, e))?;
        let current = device.format()?;
        let width = constraints.width.unwrap_or(current.width);
        let height = constraints.height.unwrap_or(current.height);

        // Prefer RGB, fallback to YUYV, else accept whatever the driver keeps
        let mut fmt = device
            .set_format(&Format::new(width, height, FourCC::new(RGB3)))
            .unwrap_or(current);
        if fmt.fourcc != FourCC::new(RGB3) {
            fmt = device
                .set_format(&Format::new(width, height, FourCC::new(YUYV)))
                .unwrap_or(fmt);
        }
        if !is_supported(fmt.fourcc) {
            return Err(DeviceError::UnsupportedFormat {
                device: path.to_string(),
                fourcc: fmt.fourcc.to_string(),
            });
        }

        let stream = Stream::with_buffers(&device, Type::VideoCapture, 4)?;
        log::info!(
            "opened {}: {}x{} {}",
            path,
            fmt.width,
            fmt.height,
            fmt.fourcc
        );
        Ok(Self {
            path: path.to_string(),
            device,
            stream: Some(stream),
        })
    }
}

impl CaptureDevice for V4lCamera {
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.stream.as_ref()?;
        let fmt = self.device.format().ok()?;
        (fmt.width > 0 && fmt.height > 0).then_some((fmt.width, fmt.height))
    }

    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        // Resolved per frame; the driver may renegotiate after open.
        let fmt = self
            .device
            .format()
            .map_err(|e| CaptureError::Grab(e.to_string()))?;
        let stream = self.stream.as_mut().ok_or(CaptureError::NoSession)?;
        let (data, meta) = stream
            .next()
            .map_err(|e| CaptureError::Grab(e.to_string()))?;
        if meta.bytesused == 0 {
            return Err(CaptureError::NotReady);
        }
        log::debug!(
            "captured frame: width={} height={} fourcc={} seq={} len={}",
            fmt.width,
            fmt.height,
            fmt.fourcc,
            meta.sequence,
            data.len()
        );
        let rgb = to_rgb(fmt.fourcc, fmt.width, fmt.height, data)?;
        ImageBuffer::from_raw(fmt.width, fmt.height, rgb)
            .ok_or_else(|| CaptureError::Grab("failed to build image buffer".into()))
    }

    fn stop(&mut self) {
        // Dropping the mmap stream issues STREAMOFF and unmaps the buffers.
        if self.stream.take().is_some() {
            log::debug!("stream stopped on {}", self.path);
        }
    }
}

fn is_supported(fourcc: FourCC) -> bool {
    fourcc == FourCC::new(RGB3) || fourcc == FourCC::new(YUYV) || fourcc == FourCC::new(GREY)
}

pub(crate) fn to_rgb(
    fourcc: FourCC,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<Vec<u8>, CaptureError> {
    let expected = (width * height * 3) as usize;
    let mut buf = match &fourcc.repr {
        b"RGB3" => data.to_vec(),
        b"YUYV" => yuyv_to_rgb(width, height, data)?,
        b"GREY" => grey_to_rgb(width, height, data)?,
        _ => {
            return Err(CaptureError::Grab(format!(
                "unexpected pixel format {}",
                fourcc
            )))
        }
    };
    if buf.len() < expected {
        log::error!(
            "buffer too small: got {}, expected {} (fourcc {})",
            buf.len(),
            expected,
            fourcc
        );
        return Err(CaptureError::Grab("buffer too small".into()));
    }
    buf.truncate(expected);
    Ok(buf)
}

fn yuyv_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(CaptureError::Grab("short YUYV buffer".into()));
    }
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;
        for y in [y0, y1] {
            out.push(clamp(y + 1.402 * v));
            out.push(clamp(y - 0.344136 * u - 0.714136 * v));
            out.push(clamp(y + 1.772 * u));
        }
    }
    Ok(out)
}

fn grey_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let expected = (width * height) as usize;
    if data.len() < expected {
        return Err(CaptureError::Grab("short GREY buffer".into()));
    }
    Ok(data[..expected].iter().flat_map(|&y| [y, y, y]).collect())
}

fn clamp(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}
