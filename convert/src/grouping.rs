//! Concatenates normalized single-trial captures into fixed-size trial
//! groups. Input order becomes trial order and is never reordered.

use ndarray::{concatenate, Array3, Array4, Axis};
use thiserror::Error;

use crate::capture::RawCapture;

#[derive(Debug,Error)]
pub enum GroupError {
    #[error("{source_name}: trial shape {got} differs from the group's {expected}")]
    HeterogeneousTrialShape{source_name:String,expected:String,got:String},
    #[error("{remainder} capture(s) left over after grouping by {group_size}. Discard them or change the group size")]
    IncompleteTrialGroup{remainder:usize,group_size:usize},
}

/// One record's worth of concatenated trials, not yet carrying a header.
#[derive(Clone,Debug)]
pub struct TrialGroup {
    /// [trials][points][width][height]
    pub data:Array4<f64>,
    /// [trials][points][channels]
    pub fp_data:Option<Array3<f64>>,
    pub interval_between_samples:f32,
    pub camera_program:u32,
    pub source_names:Vec<String>,
}

/// Concatenate captures along the trial axis in windows of n_per_group.
/// The capture order is the trial order. A trailing remainder is an error
/// rather than a silently short or padded group.
pub fn group_trials(captures:Vec<RawCapture>,n_per_group:usize) -> Result<Vec<TrialGroup>,GroupError> {
    assert!(n_per_group > 0,"group size must be at least 1");
    if captures.len() % n_per_group != 0 {
        return Err(GroupError::IncompleteTrialGroup{
            remainder:captures.len() % n_per_group,
            group_size:n_per_group,
        });
    }
    let mut groups = Vec::with_capacity(captures.len()/n_per_group);
    for window in captures.chunks(n_per_group) {
        groups.push(concatenate_window(window)?);
    }
    Ok(groups)
}

fn concatenate_window(window:&[RawCapture]) -> Result<TrialGroup,GroupError> {
    let first = &window[0];
    let expected = shape_string(first);
    for capture in window {
        let got = shape_string(capture);
        if got != expected {
            return Err(GroupError::HeterogeneousTrialShape{
                source_name:capture.source_name.clone(),
                expected,
                got,
            });
        }
    }
    let views:Vec<_> = window.iter().map(|c| c.data.view()).collect();
    let data = concatenate(Axis(0),&views).expect("trial shapes were checked");
    // fp traces only survive when every capture in the window carries them
    let fp_data = match window.iter().all(|c| c.fp_data.is_some()) {
        true => {
            let fp_views:Vec<_> = window.iter()
                .map(|c| c.fp_data.as_ref().expect("presence was checked").view().insert_axis(Axis(0)))
                .collect();
            Some(concatenate(Axis(0),&fp_views).expect("trial shapes were checked"))
        }
        false => None,
    };
    Ok(TrialGroup {
        data,
        fp_data,
        interval_between_samples:first.interval_between_samples,
        camera_program:first.camera_program,
        source_names:window.iter().map(|c| c.source_name.clone()).collect(),
    })
}

fn shape_string(capture:&RawCapture) -> String {
    let mut s = format!("{} x {} x {}",capture.points(),capture.width(),capture.height());
    if let Some(fp) = &capture.fp_data {
        s.push_str(&format!(" (fp {} x {})",fp.dim().0,fp.dim().1));
    }
    s
}
