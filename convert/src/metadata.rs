//! Fills the header fields the capture source never records. The values
//! are the fixed ones the downstream analysis tools expect, not anything
//! measured, and the calibration images are documented stand-ins: a real
//! calibration has to be supplied externally.

use ndarray::{s, Array3};
use vi_data::zda::{ImagingRecord, Rli, ZdaHeader};

use crate::grouping::TrialGroup;

pub const VERSION:u8 = 5;
pub const INTERVAL_BETWEEN_TRIALS:u8 = 2;
pub const ACQUISITION_GAIN:u16 = 1;
pub const TIME_REC_CONTROL:u64 = 5;
pub const RESET_ONSET:f32 = 1.0;
pub const RESET_DURATION:f32 = 5.0;
pub const SHUTTER_ONSET:f32 = 5.0;
pub const SHUTTER_DURATION:f32 = 5.0;
pub const STIM1_ONSET:f32 = 20.0;
pub const STIM1_DURATION:f32 = 1.0;
pub const STIM2_ONSET:f32 = 0.0;
pub const STIM2_DURATION:f32 = 0.0;
pub const ACQUISITION_ONSET:f32 = 1.0;

/// fp traces are stored with this fixed channel count, padded with zeros
pub const NUM_FP_CHANNELS:usize = 8;

/// Record numbering for one conversion run. Callers hold one of these per
/// invocation, so there is no shared counter between runs.
pub struct RecordContext {
    next_record_no:u16,
    assign_ascending:bool,
}

impl RecordContext {

    pub fn new(first_record_no:u16,assign_ascending:bool) -> Self {
        Self {
            next_record_no:first_record_no,
            assign_ascending,
        }
    }

    /// The number for the next completed trial group. With ascending
    /// assignment the counter advances once per call, otherwise every
    /// record keeps the caller's number.
    pub fn next_record_no(&mut self) -> u16 {
        let n = self.next_record_no;
        if self.assign_ascending {
            self.next_record_no += 1;
        }
        n
    }
}

/// Build a full record from a trial group, synthesizing every header field
/// the capture source does not provide.
pub fn fill(group:TrialGroup,slice_no:u16,location_no:u16,ctx:&mut RecordContext) -> ImagingRecord {
    let (trials,points,width,height) = group.data.dim();
    let header = ZdaHeader {
        version:VERSION,
        slice_number:slice_no,
        location_number:location_no,
        record_number:ctx.next_record_no(),
        camera_program:group.camera_program,
        number_of_trials:trials as u8,
        interval_between_trials:INTERVAL_BETWEEN_TRIALS,
        acquisition_gain:ACQUISITION_GAIN,
        points_per_trace:points as u32,
        time_rec_control:TIME_REC_CONTROL,
        reset_onset:RESET_ONSET,
        reset_duration:RESET_DURATION,
        shutter_onset:SHUTTER_ONSET,
        shutter_duration:SHUTTER_DURATION,
        stim1_onset:STIM1_ONSET,
        stim1_duration:STIM1_DURATION,
        stim2_onset:STIM2_ONSET,
        stim2_duration:STIM2_DURATION,
        acquisition_onset:ACQUISITION_ONSET,
        interval_between_samples:group.interval_between_samples,
        raw_width:width as u32,
        raw_height:height as u32,
    };
    // placeholder calibration: low is dark, max is unity, high borrows the
    // first frame of the first trial as a baseline fluorescence image
    let n = width*height;
    let high:Vec<u16> = group.data.slice(s![0,0,..,..]).iter().map(|v| *v as u16).collect();
    let rli = Rli {
        low:vec![0;n],
        high,
        max:vec![1;n],
    };
    let data = group.data.mapv(|v| v as u16);
    let fp_data = group.fp_data.map(|fp| resize_fp(&fp));
    ImagingRecord{header,rli,data,fp_data}
}

fn resize_fp(fp:&ndarray::Array3<f64>) -> Array3<u16> {
    let (trials,points,channels) = fp.dim();
    let mut out = Array3::<u16>::zeros((trials,NUM_FP_CHANNELS,points));
    let keep = channels.min(NUM_FP_CHANNELS);
    for t in 0..trials {
        for c in 0..keep {
            for p in 0..points {
                out[[t,c,p]] = fp[[t,p,c]] as u16;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    fn group(trials:usize,points:usize,side:usize) -> TrialGroup {
        TrialGroup {
            data:Array4::from_shape_fn((trials,points,side,side),|(t,p,x,y)| (t*1000+p*100+x*10+y) as f64),
            fp_data:None,
            interval_between_samples:0.25,
            camera_program:5,
            source_names:(0..trials).map(|i| format!("trial{:03}",i)).collect(),
        }
    }

    #[test]
    fn header_carries_the_documented_defaults(){
        let mut ctx = RecordContext::new(7,false);
        let record = fill(group(2,3,4),1,2,&mut ctx);
        let h = &record.header;
        assert_eq!(h.version,5);
        assert_eq!((h.slice_number,h.location_number,h.record_number),(1,2,7));
        assert_eq!(h.camera_program,5);
        assert_eq!((h.number_of_trials,h.points_per_trace),(2,3));
        assert_eq!((h.raw_width,h.raw_height),(4,4));
        assert_eq!(h.interval_between_trials,2);
        assert_eq!(h.acquisition_gain,1);
        assert_eq!(h.time_rec_control,5);
        assert_eq!((h.reset_onset,h.reset_duration),(1.0,5.0));
        assert_eq!((h.shutter_onset,h.shutter_duration),(5.0,5.0));
        assert_eq!((h.stim1_onset,h.stim1_duration),(20.0,1.0));
        assert_eq!((h.stim2_onset,h.stim2_duration),(0.0,0.0));
        assert_eq!(h.acquisition_onset,1.0);
        assert_eq!(h.interval_between_samples,0.25);
        record.validate().unwrap();
    }

    #[test]
    fn ascending_numbers_advance_once_per_group(){
        let mut ctx = RecordContext::new(1,true);
        assert_eq!(fill(group(1,2,4),1,1,&mut ctx).header.record_number,1);
        assert_eq!(fill(group(1,2,4),1,1,&mut ctx).header.record_number,2);
        assert_eq!(fill(group(1,2,4),1,1,&mut ctx).header.record_number,3);
    }

    #[test]
    fn fixed_numbers_stay_put(){
        let mut ctx = RecordContext::new(9,false);
        assert_eq!(fill(group(1,2,4),1,1,&mut ctx).header.record_number,9);
        assert_eq!(fill(group(1,2,4),1,1,&mut ctx).header.record_number,9);
    }

    #[test]
    fn calibration_placeholders_are_synthesized(){
        let mut ctx = RecordContext::new(1,true);
        let record = fill(group(1,2,4),1,1,&mut ctx);
        assert!(record.rli.low.iter().all(|v| *v == 0));
        assert!(record.rli.max.iter().all(|v| *v == 1));
        // high is the first frame of the first trial
        for x in 0..4 {
            for y in 0..4 {
                assert_eq!(record.rli.high[x*4+y],(x*10+y) as u16);
            }
        }
    }

    #[test]
    fn fp_traces_are_padded_to_the_fixed_channel_count(){
        let mut g = group(2,3,4);
        g.fp_data = Some(Array3::from_shape_fn((2,3,2),|(t,p,c)| (t*100+p*10+c) as f64));
        let mut ctx = RecordContext::new(1,true);
        let record = fill(g,1,1,&mut ctx);
        let fp = record.fp_data.unwrap();
        assert_eq!(fp.dim(),(2,NUM_FP_CHANNELS,3));
        assert_eq!(fp[[1,0,2]],120);
        assert_eq!(fp[[1,1,2]],121);
        assert!(fp.slice(ndarray::s![..,2..,..]).iter().all(|v| *v == 0));
    }
}
