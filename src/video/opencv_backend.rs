use std::path::Path;

use image::RgbImage;
use opencv::{
    core::{self, AlgorithmHint, Mat, Scalar, Size},
    imgproc,
    prelude::*,
    videoio,
};

use crate::error::{PipelineError, Result};
use crate::video::{OUTPUT_FOURCC, VideoBackend, VideoProps, VideoSink, VideoSource};

fn decode_err(context: &str, err: opencv::Error) -> PipelineError {
    PipelineError::Decode(format!("{}: {}", context, err))
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| PipelineError::Decode(format!("non UTF-8 path {:?}", path)))
}

/// Video backend using OpenCV's `videoio` module
#[derive(Debug, Default, Clone)]
pub struct OpenCvBackend;

impl VideoBackend for OpenCvBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        let capture = videoio::VideoCapture::from_file(path_str(path)?, videoio::CAP_ANY)
            .map_err(|e| decode_err("opening video", e))?;
        if !capture.is_opened().map_err(|e| decode_err("opening video", e))? {
            return Err(PipelineError::Decode(format!(
                "failed to open input video {}",
                path.display()
            )));
        }

        let prop = |id: i32| capture.get(id).map_err(|e| decode_err("reading video props", e));
        let props = VideoProps::new(
            prop(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            prop(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
            prop(videoio::CAP_PROP_FPS)?,
        );

        Ok(Box::new(OpenCvSource {
            capture,
            props,
            frame: Mat::default(),
            rgb: Mat::default(),
        }))
    }

    fn create_sink(&self, path: &Path, props: VideoProps) -> Result<Box<dyn VideoSink>> {
        let [a, b, c, d] = OUTPUT_FOURCC;
        let fourcc = videoio::VideoWriter::fourcc(a, b, c, d)
            .map_err(|e| decode_err("building fourcc", e))?;
        let writer = videoio::VideoWriter::new(
            path_str(path)?,
            fourcc,
            props.fps,
            Size::new(props.width as i32, props.height as i32),
            true,
        )
        .map_err(|e| decode_err("creating video writer", e))?;

        if !writer.is_opened().map_err(|e| decode_err("creating video writer", e))? {
            return Err(PipelineError::Decode(format!(
                "failed to open output video {}",
                path.display()
            )));
        }

        Ok(Box::new(OpenCvSink { writer, props }))
    }
}

struct OpenCvSource {
    capture: videoio::VideoCapture,
    props: VideoProps,
    frame: Mat,
    rgb: Mat,
}

impl VideoSource for OpenCvSource {
    fn props(&self) -> VideoProps {
        self.props
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let read = self
            .capture
            .read(&mut self.frame)
            .map_err(|e| decode_err("reading frame", e))?;
        if !read || self.frame.empty() {
            return Ok(None);
        }

        imgproc::cvt_color(
            &self.frame,
            &mut self.rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| decode_err("converting frame", e))?;

        let (width, height) = (self.rgb.cols() as u32, self.rgb.rows() as u32);
        let bytes = self
            .rgb
            .data_bytes()
            .map_err(|e| decode_err("reading frame data", e))?;

        RgbImage::from_raw(width, height, bytes.to_vec())
            .map(Some)
            .ok_or_else(|| PipelineError::Decode("frame buffer size mismatch".to_string()))
    }
}

impl Drop for OpenCvSource {
    fn drop(&mut self) {
        let _ = self.capture.release();
    }
}

struct OpenCvSink {
    writer: videoio::VideoWriter,
    props: VideoProps,
}

impl VideoSink for OpenCvSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.width() != self.props.width || frame.height() != self.props.height {
            return Err(PipelineError::Decode(format!(
                "frame is {}x{}, writer expects {}x{}",
                frame.width(),
                frame.height(),
                self.props.width,
                self.props.height
            )));
        }

        let mut rgb = Mat::new_rows_cols_with_default(
            frame.height() as i32,
            frame.width() as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(|e| decode_err("allocating frame", e))?;
        rgb.data_bytes_mut()
            .map_err(|e| decode_err("allocating frame", e))?
            .copy_from_slice(frame.as_raw());

        let mut bgr = Mat::default();
        imgproc::cvt_color(
            &rgb,
            &mut bgr,
            imgproc::COLOR_RGB2BGR,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| decode_err("converting frame", e))?;

        self.writer
            .write(&bgr)
            .map_err(|e| decode_err("writing frame", e))
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer
            .release()
            .map_err(|e| decode_err("closing video writer", e))
    }
}
