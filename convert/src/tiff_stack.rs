//! Reads a multi-page 16 bit grayscale TIFF stack as one single-trial
//! capture. Pages become the time axis.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array4;
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

use crate::capture::RawCapture;

#[derive(Debug,Error)]
pub enum IngestError {
    #[error("page {page} is {got_width} x {got_height}, the first page was {width} x {height}")]
    InconsistentPages{page:usize,width:u32,height:u32,got_width:u32,got_height:u32},
    #[error("unsupported sample format on page {page}: expected 16 bit grayscale")]
    UnsupportedFormat{page:usize},
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn read_capture(file_path:&Path,interval_between_samples:f32,camera_program:u32)
    -> Result<RawCapture,IngestError> {
    let file = File::open(file_path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width,height) = decoder.dimensions()?;
    let mut frames:Vec<Vec<u16>> = Vec::new();
    loop {
        let page = frames.len();
        let (w,h) = decoder.dimensions()?;
        if (w,h) != (width,height) {
            return Err(IngestError::InconsistentPages{
                page,width,height,got_width:w,got_height:h
            });
        }
        if decoder.colortype()? != ColorType::Gray(16) {
            return Err(IngestError::UnsupportedFormat{page});
        }
        match decoder.read_image()? {
            DecodingResult::U16(buf) => frames.push(buf),
            _ => return Err(IngestError::UnsupportedFormat{page}),
        }
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }
    // tiff pages are row major [y][x], the capture wants [points][x][y]
    let points = frames.len();
    let (width,height) = (width as usize,height as usize);
    let mut data = Array4::<f64>::zeros((1,points,width,height));
    for (p,frame) in frames.iter().enumerate() {
        for y in 0..height {
            for x in 0..width {
                data[[0,p,x,y]] = frame[y*width + x] as f64;
            }
        }
    }
    let source_name = file_path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string_lossy().to_string());
    Ok(RawCapture {
        data,
        fp_data:None,
        interval_between_samples,
        camera_program,
        source_name,
    })
}
