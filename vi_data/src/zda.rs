//! Imaging-record (.zda) binary format. Little-endian throughout, fixed
//! 1024 byte header region, body is three reference-light-intensity
//! images followed by the trial sample data.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::Range;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use ndarray::{Array3, Array4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HEADER_SIZE:usize = 1024;

const VERSION_BYTE:usize = 0;
const SLICE_NUMBER:Range<usize> = 1..3;
const LOCATION_NUMBER:Range<usize> = 3..5;
const RECORD_NUMBER:Range<usize> = 5..7;
const CAMERA_PROGRAM:Range<usize> = 7..11;
const NUMBER_OF_TRIALS:usize = 11;
const INTERVAL_BETWEEN_TRIALS:usize = 12;
const ACQUISITION_GAIN:Range<usize> = 13..15;
const POINTS_PER_TRACE:Range<usize> = 15..19;
const TIME_REC_CONTROL:Range<usize> = 19..27;
const RESET_ONSET:Range<usize> = 27..31;
const RESET_DURATION:Range<usize> = 31..35;
const SHUTTER_ONSET:Range<usize> = 35..39;
const SHUTTER_DURATION:Range<usize> = 39..43;
const STIM1_ONSET:Range<usize> = 43..47;
const STIM1_DURATION:Range<usize> = 47..51;
const STIM2_ONSET:Range<usize> = 51..55;
const STIM2_DURATION:Range<usize> = 55..59;
const ACQUISITION_ONSET:Range<usize> = 59..63;
const INTERVAL_BETWEEN_SAMPLES:Range<usize> = 63..67;
const RAW_WIDTH:Range<usize> = 67..71;
const RAW_HEIGHT:Range<usize> = 71..75;

#[derive(Debug,Error)]
pub enum ZdaError {
    #[error("unexpected end of file inside the header region ({got} of {HEADER_SIZE} bytes)")]
    MalformedHeader{got:usize},
    #[error("record body ended early in {section}: expected {expected} samples, got {got}")]
    TruncatedBody{section:&'static str,expected:usize,got:usize},
    #[error("frame is not square: {width} x {height}")]
    NonSquareArray{width:u32,height:u32},
    #[error("record is inconsistent with its header: {reason}")]
    ShapeMismatch{reason:String},
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct ZdaHeader {
    pub version:u8,
    pub slice_number:u16,
    pub location_number:u16,
    pub record_number:u16,
    pub camera_program:u32,
    pub number_of_trials:u8,
    pub interval_between_trials:u8,
    pub acquisition_gain:u16,
    pub points_per_trace:u32,
    pub time_rec_control:u64,
    pub reset_onset:f32,
    pub reset_duration:f32,
    pub shutter_onset:f32,
    pub shutter_duration:f32,
    pub stim1_onset:f32,
    pub stim1_duration:f32,
    pub stim2_onset:f32,
    pub stim2_duration:f32,
    pub acquisition_onset:f32,
    pub interval_between_samples:f32,
    pub raw_width:u32,
    pub raw_height:u32,
}

impl ZdaHeader {

    pub fn num_diodes(&self) -> usize {
        self.raw_width as usize * self.raw_height as usize
    }

    pub fn n_samples(&self) -> usize {
        self.number_of_trials as usize * self.points_per_trace as usize * self.num_diodes()
    }

    /// (trials, points, width, height)
    pub fn dims(&self) -> (usize,usize,usize,usize) {
        (self.number_of_trials as usize,
         self.points_per_trace as usize,
         self.raw_width as usize,
         self.raw_height as usize)
    }

    fn pack(&self,buf:&mut [u8;HEADER_SIZE]) {
        buf[VERSION_BYTE] = self.version;
        LittleEndian::write_u16(&mut buf[SLICE_NUMBER],self.slice_number);
        LittleEndian::write_u16(&mut buf[LOCATION_NUMBER],self.location_number);
        LittleEndian::write_u16(&mut buf[RECORD_NUMBER],self.record_number);
        LittleEndian::write_u32(&mut buf[CAMERA_PROGRAM],self.camera_program);
        buf[NUMBER_OF_TRIALS] = self.number_of_trials;
        buf[INTERVAL_BETWEEN_TRIALS] = self.interval_between_trials;
        LittleEndian::write_u16(&mut buf[ACQUISITION_GAIN],self.acquisition_gain);
        LittleEndian::write_u32(&mut buf[POINTS_PER_TRACE],self.points_per_trace);
        LittleEndian::write_u64(&mut buf[TIME_REC_CONTROL],self.time_rec_control);
        LittleEndian::write_f32(&mut buf[RESET_ONSET],self.reset_onset);
        LittleEndian::write_f32(&mut buf[RESET_DURATION],self.reset_duration);
        LittleEndian::write_f32(&mut buf[SHUTTER_ONSET],self.shutter_onset);
        LittleEndian::write_f32(&mut buf[SHUTTER_DURATION],self.shutter_duration);
        LittleEndian::write_f32(&mut buf[STIM1_ONSET],self.stim1_onset);
        LittleEndian::write_f32(&mut buf[STIM1_DURATION],self.stim1_duration);
        LittleEndian::write_f32(&mut buf[STIM2_ONSET],self.stim2_onset);
        LittleEndian::write_f32(&mut buf[STIM2_DURATION],self.stim2_duration);
        LittleEndian::write_f32(&mut buf[ACQUISITION_ONSET],self.acquisition_onset);
        LittleEndian::write_f32(&mut buf[INTERVAL_BETWEEN_SAMPLES],self.interval_between_samples);
        LittleEndian::write_u32(&mut buf[RAW_WIDTH],self.raw_width);
        LittleEndian::write_u32(&mut buf[RAW_HEIGHT],self.raw_height);
    }

    fn unpack(buf:&[u8;HEADER_SIZE]) -> Self {
        Self {
            version:buf[VERSION_BYTE],
            slice_number:LittleEndian::read_u16(&buf[SLICE_NUMBER]),
            location_number:LittleEndian::read_u16(&buf[LOCATION_NUMBER]),
            record_number:LittleEndian::read_u16(&buf[RECORD_NUMBER]),
            camera_program:LittleEndian::read_u32(&buf[CAMERA_PROGRAM]),
            number_of_trials:buf[NUMBER_OF_TRIALS],
            interval_between_trials:buf[INTERVAL_BETWEEN_TRIALS],
            acquisition_gain:LittleEndian::read_u16(&buf[ACQUISITION_GAIN]),
            points_per_trace:LittleEndian::read_u32(&buf[POINTS_PER_TRACE]),
            time_rec_control:LittleEndian::read_u64(&buf[TIME_REC_CONTROL]),
            reset_onset:LittleEndian::read_f32(&buf[RESET_ONSET]),
            reset_duration:LittleEndian::read_f32(&buf[RESET_DURATION]),
            shutter_onset:LittleEndian::read_f32(&buf[SHUTTER_ONSET]),
            shutter_duration:LittleEndian::read_f32(&buf[SHUTTER_DURATION]),
            stim1_onset:LittleEndian::read_f32(&buf[STIM1_ONSET]),
            stim1_duration:LittleEndian::read_f32(&buf[STIM1_DURATION]),
            stim2_onset:LittleEndian::read_f32(&buf[STIM2_ONSET]),
            stim2_duration:LittleEndian::read_f32(&buf[STIM2_DURATION]),
            acquisition_onset:LittleEndian::read_f32(&buf[ACQUISITION_ONSET]),
            interval_between_samples:LittleEndian::read_f32(&buf[INTERVAL_BETWEEN_SAMPLES]),
            raw_width:LittleEndian::read_u32(&buf[RAW_WIDTH]),
            raw_height:LittleEndian::read_u32(&buf[RAW_HEIGHT]),
        }
    }

    pub fn decode<R:Read>(reader:&mut R) -> Result<Self,ZdaError> {
        let mut buf = [0u8;HEADER_SIZE];
        let got = read_fully(reader,&mut buf)?;
        if got < HEADER_SIZE {
            return Err(ZdaError::MalformedHeader{got});
        }
        let header = Self::unpack(&buf);
        if header.raw_width == 0 || header.raw_height == 0 || header.raw_width != header.raw_height {
            return Err(ZdaError::NonSquareArray{width:header.raw_width,height:header.raw_height});
        }
        Ok(header)
    }

    pub fn from_file(file_path:&Path) -> Result<Self,ZdaError> {
        let mut reader = BufReader::new(File::open(file_path)?);
        Self::decode(&mut reader)
    }
}

/// The three per-pixel calibration images, each width*height long.
#[derive(Clone,Debug,PartialEq)]
pub struct Rli {
    pub low:Vec<u16>,
    pub high:Vec<u16>,
    pub max:Vec<u16>,
}

#[derive(Clone,Debug,PartialEq)]
pub struct ImagingRecord {
    pub header:ZdaHeader,
    pub rli:Rli,
    /// logical shape [trials][points][width][height]
    pub data:Array4<u16>,
    /// auxiliary field-potential traces [trials][channels][points].
    /// Carried in memory for analysis consumers. Not part of the on-disk
    /// layout, so encode skips it and decode yields None.
    pub fp_data:Option<Array3<u16>>,
}

impl ImagingRecord {

    pub fn validate(&self) -> Result<(),ZdaError> {
        let h = &self.header;
        if h.raw_width == 0 || h.raw_height == 0 || h.raw_width != h.raw_height {
            return Err(ZdaError::NonSquareArray{width:h.raw_width,height:h.raw_height});
        }
        let expected = h.dims();
        let got = self.data.dim();
        if got != expected {
            return Err(ZdaError::ShapeMismatch{
                reason:format!("sample array is {:?}, header declares {:?}",got,expected)
            });
        }
        let n = h.num_diodes();
        if self.rli.low.len() != n || self.rli.high.len() != n || self.rli.max.len() != n {
            return Err(ZdaError::ShapeMismatch{
                reason:format!("rli arrays are {}/{}/{} long, header declares {}",
                               self.rli.low.len(),self.rli.high.len(),self.rli.max.len(),n)
            });
        }
        if let Some(fp) = &self.fp_data {
            if fp.dim().0 != expected.0 {
                return Err(ZdaError::ShapeMismatch{
                    reason:format!("fp array holds {} trials, header declares {}",fp.dim().0,expected.0)
                });
            }
        }
        Ok(())
    }

    pub fn encode<W:Write>(&self,writer:&mut W) -> Result<(),ZdaError> {
        self.validate()?;
        let mut header = [0u8;HEADER_SIZE];
        self.header.pack(&mut header);
        writer.write_all(&header)?;
        write_u16_block(writer,&self.rli.low)?;
        write_u16_block(writer,&self.rli.high)?;
        write_u16_block(writer,&self.rli.max)?;
        // disk order is trial, width, height, point (point varies fastest)
        let disk_view = self.data.view().permuted_axes([0,2,3,1]);
        let flat:Vec<u16> = disk_view.iter().copied().collect();
        write_u16_block(writer,&flat)?;
        Ok(())
    }

    pub fn decode<R:Read>(reader:&mut R) -> Result<Self,ZdaError> {
        let header = ZdaHeader::decode(reader)?;
        let n = header.num_diodes();
        let rli = Rli {
            low:read_u16_block(reader,n,"rli low")?,
            high:read_u16_block(reader,n,"rli high")?,
            max:read_u16_block(reader,n,"rli max")?,
        };
        let (trials,points,width,height) = header.dims();
        let samples = read_u16_block(reader,header.n_samples(),"sample data")?;
        // trailing bytes past the declared sample count are ignored, which
        // is what the consuming application does with them
        let disk = Array4::from_shape_vec((trials,width,height,points),samples)
            .expect("sample count was checked against the header");
        let data = disk.permuted_axes([0,3,1,2]).as_standard_layout().to_owned();
        Ok(Self{header,rli,data,fp_data:None})
    }

    pub fn to_file(&self,file_path:&Path) -> Result<(),ZdaError> {
        let mut writer = BufWriter::new(File::create(file_path)?);
        self.encode(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn from_file(file_path:&Path) -> Result<Self,ZdaError> {
        let mut reader = BufReader::new(File::open(file_path)?);
        Self::decode(&mut reader)
    }
}

fn read_fully<R:Read>(reader:&mut R,buf:&mut [u8]) -> std::io::Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        let n = reader.read(&mut buf[got..])?;
        if n == 0 {
            break;
        }
        got += n;
    }
    Ok(got)
}

fn read_u16_block<R:Read>(reader:&mut R,n:usize,section:&'static str) -> Result<Vec<u16>,ZdaError> {
    let mut bytes = vec![0u8;n*2];
    let got = read_fully(reader,&mut bytes)?;
    if got < bytes.len() {
        return Err(ZdaError::TruncatedBody{section,expected:n,got:got/2});
    }
    let mut samples = vec![0u16;n];
    LittleEndian::read_u16_into(&bytes,&mut samples);
    Ok(samples)
}

fn write_u16_block<W:Write>(writer:&mut W,samples:&[u16]) -> std::io::Result<()> {
    let mut bytes = vec![0u8;samples.len()*2];
    LittleEndian::write_u16_into(samples,&mut bytes);
    writer.write_all(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn test_header(trials:u8,points:u32,side:u32) -> ZdaHeader {
        ZdaHeader {
            version:5,
            slice_number:1,
            location_number:2,
            record_number:3,
            camera_program:4,
            number_of_trials:trials,
            interval_between_trials:2,
            acquisition_gain:1,
            points_per_trace:points,
            time_rec_control:5,
            reset_onset:1.0,
            reset_duration:5.0,
            shutter_onset:5.0,
            shutter_duration:5.0,
            stim1_onset:20.0,
            stim1_duration:1.0,
            stim2_onset:0.0,
            stim2_duration:0.0,
            acquisition_onset:1.0,
            interval_between_samples:0.5,
            raw_width:side,
            raw_height:side,
        }
    }

    fn test_record(trials:u8,points:u32,side:u32) -> ImagingRecord {
        let header = test_header(trials,points,side);
        let n = header.num_diodes();
        let (t,p,w,h) = header.dims();
        let data = Array4::from_shape_fn((t,p,w,h),|(t,p,x,y)| {
            (t*1000 + p*100 + x*10 + y) as u16
        });
        ImagingRecord {
            header,
            rli:Rli{low:vec![0;n],high:vec![7;n],max:vec![1;n]},
            data,
            fp_data:None,
        }
    }

    fn encode_to_vec(record:&ImagingRecord) -> Vec<u8> {
        let mut bytes = Vec::new();
        record.encode(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn header_layout_is_byte_exact(){
        let record = test_record(1,2,2);
        let bytes = encode_to_vec(&record);
        assert_eq!(bytes.len(),HEADER_SIZE + 3*4*2 + 8*2);
        assert_eq!(bytes[0],5);
        assert_eq!(LittleEndian::read_u16(&bytes[1..3]),1);
        assert_eq!(LittleEndian::read_u16(&bytes[3..5]),2);
        assert_eq!(LittleEndian::read_u16(&bytes[5..7]),3);
        assert_eq!(LittleEndian::read_u32(&bytes[7..11]),4);
        assert_eq!(bytes[11],1);
        assert_eq!(bytes[12],2);
        assert_eq!(LittleEndian::read_u16(&bytes[13..15]),1);
        assert_eq!(LittleEndian::read_u32(&bytes[15..19]),2);
        assert_eq!(LittleEndian::read_u64(&bytes[19..27]),5);
        assert_eq!(LittleEndian::read_f32(&bytes[43..47]),20.0);
        assert_eq!(LittleEndian::read_f32(&bytes[63..67]),0.5);
        assert_eq!(LittleEndian::read_u32(&bytes[67..71]),2);
        assert_eq!(LittleEndian::read_u32(&bytes[71..75]),2);
        // header region is zero padded out to the body offset
        assert!(bytes[75..HEADER_SIZE].iter().all(|b| *b == 0));
    }

    #[test]
    fn body_is_trial_width_height_point_ordered(){
        let record = test_record(1,2,2);
        let bytes = encode_to_vec(&record);
        let body = &bytes[HEADER_SIZE..];
        let mut samples = vec![0u16;body.len()/2];
        LittleEndian::read_u16_into(body,&mut samples);
        assert_eq!(&samples[..4],&[0,0,0,0]);
        assert_eq!(&samples[4..8],&[7,7,7,7]);
        assert_eq!(&samples[8..12],&[1,1,1,1]);
        // data[t,p,x,y] = t*1000 + p*100 + x*10 + y, point fastest on disk
        assert_eq!(&samples[12..],&[0,100,1,101,10,110,11,111]);
    }

    #[test]
    fn round_trip(){
        let record = test_record(3,4,2);
        let bytes = encode_to_vec(&record);
        let decoded = ImagingRecord::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded,record);
    }

    #[test]
    fn all_zero_scenario_round_trips(){
        let header = test_header(5,1000,80);
        let n = header.num_diodes();
        let record = ImagingRecord {
            data:Array4::zeros(header.dims()),
            rli:Rli{low:vec![0;n],high:vec![0;n],max:vec![0;n]},
            header,
            fp_data:None,
        };
        let bytes = encode_to_vec(&record);
        assert_eq!(bytes.len(),HEADER_SIZE + 2*(3*6400 + 5*1000*6400));
        let decoded = ImagingRecord::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded.header,record.header);
        assert_eq!(decoded.data.dim(),(5,1000,80,80));
        assert!(decoded.data.iter().all(|s| *s == 0));
        assert_eq!(decoded,record);
    }

    #[test]
    fn short_header_is_malformed(){
        let record = test_record(1,2,2);
        let bytes = encode_to_vec(&record);
        match ImagingRecord::decode(&mut &bytes[..100]) {
            Err(ZdaError::MalformedHeader{got:100}) => {}
            other => panic!("expected MalformedHeader, got {:?}",other.map(|_| ())),
        }
    }

    #[test]
    fn short_body_is_truncated_not_zero_filled(){
        let record = test_record(1,2,2);
        let bytes = encode_to_vec(&record);
        match ImagingRecord::decode(&mut &bytes[..HEADER_SIZE+10]) {
            Err(ZdaError::TruncatedBody{section:"rli high",expected:4,got:1}) => {}
            other => panic!("expected TruncatedBody, got {:?}",other.map(|_| ())),
        }
        match ImagingRecord::decode(&mut &bytes[..bytes.len()-3]) {
            Err(ZdaError::TruncatedBody{section:"sample data",expected:8,got:6}) => {}
            other => panic!("expected TruncatedBody, got {:?}",other.map(|_| ())),
        }
    }

    #[test]
    fn trailing_bytes_are_ignored(){
        let record = test_record(1,2,2);
        let mut bytes = encode_to_vec(&record);
        bytes.extend_from_slice(&[0xab;16]);
        let decoded = ImagingRecord::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded,record);
    }

    #[test]
    fn encode_rejects_inconsistent_records(){
        let mut record = test_record(1,2,2);
        record.header.raw_height = 3;
        let mut sink = Vec::new();
        assert!(matches!(record.encode(&mut sink),Err(ZdaError::NonSquareArray{width:2,height:3})));

        let mut record = test_record(1,2,2);
        record.header.number_of_trials = 2;
        assert!(matches!(record.encode(&mut sink),Err(ZdaError::ShapeMismatch{..})));

        let mut record = test_record(1,2,2);
        record.rli.max.pop();
        assert!(matches!(record.encode(&mut sink),Err(ZdaError::ShapeMismatch{..})));
    }
}
