//! A single capture and the geometry corrections applied to it before
//! grouping. Samples are carried as floats while the corrections run so
//! block and trace means stay exact, then rescaled back to integers by
//! `normalize_bit_range`.

use std::ops::Range;

use ndarray::{s, Array2, Array4, Axis, Dimension};
use thiserror::Error;

#[derive(Debug,Error)]
pub enum NormalizeError {
    #[error("{axis} range {start}..{end} is inverted or outside the axis length {len}")]
    InvalidRange{axis:&'static str,start:usize,end:usize,len:usize},
    #[error("cannot bin {width} x {height} frames by {factor}: both axes must divide evenly")]
    BinningMismatch{width:usize,height:usize,factor:usize},
    #[error("frame is still {width} x {height} after correction. Adjust cropping and/or binning")]
    NonSquareArray{width:usize,height:usize},
}

#[derive(Clone,Debug)]
pub struct RawCapture {
    /// working sample data [trials][points][width][height]
    pub data:Array4<f64>,
    /// auxiliary field-potential traces [points][channels]
    pub fp_data:Option<Array2<f64>>,
    /// sampling interval in milliseconds
    pub interval_between_samples:f32,
    pub camera_program:u32,
    /// where the capture came from, for diagnostics and trial ordering
    pub source_name:String,
}

impl RawCapture {

    pub fn from_u16_parts(data:Array4<u16>,fp_data:Option<Array2<u16>>,
                          interval_between_samples:f32,camera_program:u32,
                          source_name:&str) -> Self {
        Self {
            data:data.mapv(|v| v as f64),
            fp_data:fp_data.map(|fp| fp.mapv(|v| v as f64)),
            interval_between_samples,
            camera_program,
            source_name:source_name.to_string(),
        }
    }

    pub fn n_trials(&self) -> usize {
        self.data.dim().0
    }

    pub fn points(&self) -> usize {
        self.data.dim().1
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().3
    }

    /// Restrict the capture to half-open ranges along the width, height
    /// and time axes. The time range applies to the fp traces as well.
    pub fn crop(mut self,x_range:Range<usize>,y_range:Range<usize>,t_range:Range<usize>)
        -> Result<Self,NormalizeError> {
        let (_,points,width,height) = self.data.dim();
        check_range("width",&x_range,width)?;
        check_range("height",&y_range,height)?;
        check_range("time",&t_range,points)?;
        self.data = self.data.slice(s![..,t_range.clone(),x_range.clone(),y_range.clone()]).to_owned();
        if let Some(fp) = self.fp_data.take() {
            self.fp_data = Some(fp.slice(s![t_range.clone(),..]).to_owned());
        }
        Ok(self)
    }

    /// Block-average the width and height axes by the given factor.
    pub fn bin(mut self,factor:usize) -> Result<Self,NormalizeError> {
        let (trials,points,width,height) = self.data.dim();
        if factor == 0 || width % factor != 0 || height % factor != 0 {
            return Err(NormalizeError::BinningMismatch{width,height,factor});
        }
        if factor == 1 {
            return Ok(self);
        }
        let (bw,bh) = (width/factor,height/factor);
        let mut binned = Array4::<f64>::zeros((trials,points,bw,bh));
        for bx in 0..bw {
            for by in 0..bh {
                let block = self.data.slice(s![..,..,bx*factor..(bx+1)*factor,by*factor..(by+1)*factor]);
                let mean = block.sum_axis(Axis(3)).sum_axis(Axis(2)) / (factor*factor) as f64;
                binned.slice_mut(s![..,..,bx,by]).assign(&mean);
            }
        }
        self.data = binned;
        Ok(self)
    }

    /// Overwrite the first n samples of every pixel trace with the mean of
    /// the remaining samples. Suppresses the acquisition onset transient.
    pub fn flatten_leading_points(mut self,n:usize) -> Result<Self,NormalizeError> {
        let points = self.points();
        if n == 0 {
            return Ok(self);
        }
        if n >= points {
            return Err(NormalizeError::InvalidRange{axis:"time",start:0,end:n,len:points});
        }
        let rest_mean = self.data.slice(s![..,n..,..,..]).sum_axis(Axis(1)) / (points-n) as f64;
        for i in 0..n {
            self.data.slice_mut(s![..,i,..,..]).assign(&rest_mean);
        }
        Ok(self)
    }

    /// Reconcile nearly-square frames. One spare line is dropped from the
    /// end of the larger axis; a bigger difference is cropped symmetrically
    /// first. The record format requires square frames, so anything left
    /// over is fatal.
    pub fn auto_correct_square(mut self) -> Result<Self,NormalizeError> {
        let (_,_,width,height) = self.data.dim();
        let diff = width.abs_diff(height);
        if diff > 1 {
            let trim = diff/2;
            if width > height {
                self.data = self.data.slice(s![..,..,trim..width-trim,..]).to_owned();
            } else {
                self.data = self.data.slice(s![..,..,..,trim..height-trim]).to_owned();
            }
        }
        let (_,_,width,height) = self.data.dim();
        if width.abs_diff(height) == 1 {
            if width > height {
                self.data = self.data.slice(s![..,..,..width-1,..]).to_owned();
            } else {
                self.data = self.data.slice(s![..,..,..,..height-1]).to_owned();
            }
        }
        let (_,_,width,height) = self.data.dim();
        if width != height {
            return Err(NormalizeError::NonSquareArray{width,height});
        }
        Ok(self)
    }

    /// Rescale samples to span [0, 2^bits]. The record format stores
    /// unsigned 16 bit samples and the analysis tools expect a 12 bit
    /// range, so this runs last, after the geometry corrections.
    pub fn normalize_bit_range(mut self,bits:u32) -> Self {
        rescale(&mut self.data,bits);
        if let Some(fp) = self.fp_data.as_mut() {
            rescale(fp,bits);
        }
        self
    }
}

fn check_range(axis:&'static str,range:&Range<usize>,len:usize) -> Result<(),NormalizeError> {
    if range.start >= range.end || range.end > len {
        return Err(NormalizeError::InvalidRange{axis,start:range.start,end:range.end,len});
    }
    Ok(())
}

fn rescale<D:Dimension>(arr:&mut ndarray::Array<f64,D>,bits:u32) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in arr.iter() {
        min = min.min(*v);
        max = max.max(*v);
    }
    if !(max > min) {
        // a flat capture maps to zero rather than dividing by zero
        arr.fill(0.0);
        return;
    }
    let span = (1u64 << bits) as f64;
    arr.mapv_inplace(|v| (v-min)/(max-min)*span);
}
