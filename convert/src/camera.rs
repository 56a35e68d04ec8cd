//! The acquisition camera's readout programs and the analysis-side
//! adjustments each one implies.

/// side length the conversion aims frames at. Recommended binning divides
/// the sensor height down to this
pub const TARGET_FRAME_SIDE:u32 = 80;

#[derive(Clone,Copy,Debug,PartialEq)]
pub struct CameraProgram {
    pub program:u32,
    /// sampling interval in milliseconds
    pub interval_between_samples:f32,
    pub width:u32,
    pub height:u32,
    /// width-axis pixel range the default crop keeps. Centered on the
    /// sensor so the cropped frame is height x height
    pub crop_window:(u32,u32),
}

pub const PROGRAMS:[CameraProgram;8] = [
    CameraProgram{program:0,interval_between_samples:1000.0/200.0,width:2048,height:1024,crop_window:(512,1536)},
    CameraProgram{program:1,interval_between_samples:1000.0/2000.0,width:2048,height:100,crop_window:(974,1074)},
    // program 2 keeps the middle 320 px of the width axis
    CameraProgram{program:2,interval_between_samples:1000.0/1000.0,width:1024,height:320,crop_window:(352,672)},
    CameraProgram{program:3,interval_between_samples:1000.0/2000.0,width:1024,height:160,crop_window:(432,592)},
    CameraProgram{program:4,interval_between_samples:1000.0/2000.0,width:512,height:160,crop_window:(176,336)},
    CameraProgram{program:5,interval_between_samples:1000.0/4000.0,width:512,height:80,crop_window:(216,296)},
    CameraProgram{program:6,interval_between_samples:1000.0/5000.0,width:256,height:60,crop_window:(98,158)},
    CameraProgram{program:7,interval_between_samples:1000.0/7500.0,width:256,height:40,crop_window:(108,148)},
];

pub fn program(id:u32) -> Option<CameraProgram> {
    PROGRAMS.get(id as usize).copied()
}

impl CameraProgram {

    pub fn recommended_binning(&self) -> u32 {
        (self.height / TARGET_FRAME_SIDE).max(1)
    }

    pub fn display(&self) -> String {
        format!("{} x {}",self.width,self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_are_centered(){
        for p in PROGRAMS.iter() {
            if p.program == 2 {
                continue;
            }
            assert_eq!(p.crop_window,(p.width/2 - p.height/2,p.width/2 + p.height/2),
                       "program {}",p.program);
        }
    }

    #[test]
    fn cropped_frames_are_square(){
        for p in PROGRAMS.iter() {
            assert_eq!(p.crop_window.1 - p.crop_window.0,p.height,"program {}",p.program);
        }
    }

    #[test]
    fn binning_targets_the_analysis_frame_side(){
        assert_eq!(program(4).unwrap().recommended_binning(),2);
        assert_eq!(program(5).unwrap().recommended_binning(),1);
        // programs below the target side still bin by one
        assert_eq!(program(7).unwrap().recommended_binning(),1);
    }

    #[test]
    fn unknown_programs_are_none(){
        assert!(program(8).is_none());
        assert_eq!(program(5).unwrap().display(),"512 x 80");
    }
}
