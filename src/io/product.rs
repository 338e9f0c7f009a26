use crate::core::platform::Platform;
use crate::types::{SceneError, SceneResult};
use chrono::{Duration, NaiveDate};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Platform and acquisition date derived from a scene directory name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneId {
    pub name: String,
    pub platform: Platform,
    pub acquisition_date: Option<NaiveDate>,
}

impl SceneId {
    /// Identify a scene from its directory name.
    ///
    /// Recognised forms:
    /// * `S2A_MSIL1C_20200103T105431_N0208_R051_T31TCF_20200103T112345.SAFE`
    /// * `LC08_L1TP_199032_20150101_20170415_01_T1`
    /// * `LC81990322015001LGN00` (pre-collection Landsat naming)
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.trim_end_matches('/').trim_end_matches(".SAFE");

        if stem.starts_with("S2") {
            let date = stem
                .split('_')
                .nth(2)
                .and_then(|s| s.get(..8))
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y%m%d").ok());
            return Some(Self {
                name: stem.to_string(),
                platform: Platform::Sentinel2,
                acquisition_date: date,
            });
        }

        if stem.starts_with("LC08_") {
            let date = stem
                .split('_')
                .nth(3)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y%m%d").ok());
            return Some(Self {
                name: stem.to_string(),
                platform: Platform::Landsat8,
                acquisition_date: date,
            });
        }

        if stem.starts_with("LC8") {
            return Some(Self {
                name: stem.to_string(),
                platform: Platform::Landsat8,
                acquisition_date: Self::year_day_date(stem),
            });
        }

        None
    }

    pub fn from_path<P: AsRef<Path>>(scene_dir: P) -> Option<Self> {
        let name = scene_dir.as_ref().file_name()?.to_string_lossy().to_string();
        Self::parse(&name)
    }

    /// Year at [9..13] and day-of-year at [13..16]
    fn year_day_date(stem: &str) -> Option<NaiveDate> {
        let year: i32 = stem.get(9..13)?.parse().ok()?;
        let day: i64 = stem.get(13..16)?.parse().ok()?;
        if day < 1 {
            return None;
        }
        NaiveDate::from_ymd_opt(year, 1, 1).map(|d| d + Duration::days(day - 1))
    }
}

/// General product information of a Sentinel-2 XML descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_type: Option<String>,
    pub spacecraft: Option<String>,
    pub processing_baseline: Option<String>,
    pub product_start_time: Option<String>,
    /// QUANTIFICATION_VALUE (L1C) or BOA_QUANTIFICATION_VALUE (L2A)
    pub quantification_value: Option<f64>,
}

impl ProductInfo {
    pub fn parse(xml_content: &str) -> SceneResult<Self> {
        let mut reader = Reader::from_str(xml_content);
        reader.trim_text(true);

        let mut info = ProductInfo::default();
        let mut current = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    current = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                }
                Ok(Event::End(_)) => current.clear(),
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| SceneError::XmlParsing(format!("Bad text node: {}", err)))?;
                    match current.as_str() {
                        "PRODUCT_TYPE" => info.product_type = Some(text.to_string()),
                        "SPACECRAFT_NAME" => info.spacecraft = Some(text.to_string()),
                        "PROCESSING_BASELINE" => info.processing_baseline = Some(text.to_string()),
                        "PRODUCT_START_TIME" => info.product_start_time = Some(text.to_string()),
                        "QUANTIFICATION_VALUE" | "BOA_QUANTIFICATION_VALUE" => {
                            info.quantification_value = text.trim().parse().ok()
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(SceneError::XmlParsing(format!(
                        "Failed to parse product descriptor at {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        Ok(info)
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> SceneResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }
}
