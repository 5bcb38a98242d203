use anyhow::{Context, Result};
use image::RgbImage;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

/// Anything that yields color frames, one blocking call at a time.
pub trait FrameSource {
    fn frame(&mut self) -> Result<RgbImage>;
}

/// V4L2 capture device streaming through mmap buffers.
pub struct Camera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    fourcc: FourCC,
}

impl Camera {
    pub fn open(device: &str) -> Result<Self> {
        let dev = Device::with_path(device).with_context(|| format!("open camera {device}"))?;
        let current = dev.format().context("query camera format")?;

        // RGB3 first, then YUYV, otherwise keep whatever the driver hands back
        let rgb = Format::new(current.width, current.height, FourCC::new(b"RGB3"));
        let mut fmt = dev.set_format(&rgb).unwrap_or(current);
        if fmt.fourcc != FourCC::new(b"RGB3") {
            let yuyv = Format::new(fmt.width, fmt.height, FourCC::new(b"YUYV"));
            fmt = dev.set_format(&yuyv).unwrap_or(fmt);
        }

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, 4).context("start stream")?;
        log::debug!(
            "camera {} streaming {}x{} {:?}",
            device,
            fmt.width,
            fmt.height,
            fmt.fourcc
        );
        Ok(Self {
            stream,
            width: fmt.width,
            height: fmt.height,
            fourcc: fmt.fourcc,
        })
    }
}

impl FrameSource for Camera {
    fn frame(&mut self) -> Result<RgbImage> {
        let (data, meta) = self.stream.next().context("capture frame")?;
        log::trace!("frame seq={} len={}", meta.sequence, data.len());

        let buf = match self.fourcc {
            f if f == FourCC::new(b"RGB3") => data.to_vec(),
            f if f == FourCC::new(b"YUYV") => yuyv_to_rgb(self.width, self.height, data)?,
            f if f == FourCC::new(b"GREY") => grey_to_rgb(self.width, self.height, data)?,
            other => anyhow::bail!("unsupported pixel format {:?}", other),
        };

        let expected = (self.width * self.height * 3) as usize;
        if buf.len() < expected {
            anyhow::bail!(
                "short frame: got {} bytes, expected {}",
                buf.len(),
                expected
            );
        }
        let mut buf = buf;
        buf.truncate(expected);
        RgbImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| anyhow::anyhow!("failed to build frame buffer"))
    }
}

fn yuyv_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        anyhow::bail!("short YUYV buffer");
    }
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0] as f32, chunk[2] as f32] {
            out.push(saturate(y + 1.402 * v));
            out.push(saturate(y - 0.344136 * u - 0.714136 * v));
            out.push(saturate(y + 1.772 * u));
        }
    }
    Ok(out)
}

fn grey_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let expected = (width * height) as usize;
    if data.len() < expected {
        anyhow::bail!("short GREY buffer");
    }
    Ok(data[..expected].iter().flat_map(|&y| [y, y, y]).collect())
}

fn saturate(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_neutral_chroma_is_grey() {
        let data = [100u8, 128, 200, 128];
        let rgb = yuyv_to_rgb(2, 1, &data).unwrap();
        assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(yuyv_to_rgb(4, 4, &[0; 8]).is_err());
        assert!(grey_to_rgb(4, 4, &[0; 8]).is_err());
    }

    #[test]
    fn grey_expands_to_three_channels() {
        let rgb = grey_to_rgb(2, 1, &[7, 9]).unwrap();
        assert_eq!(rgb, vec![7, 7, 7, 9, 9, 9]);
    }
}
