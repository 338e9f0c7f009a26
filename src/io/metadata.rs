use crate::types::{SceneError, SceneResult};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Locate the single metadata descriptor of a scene directory.
///
/// Several matching files are tolerated only when their contents are identical.
pub fn find_descriptor<P: AsRef<Path>>(scene_dir: P, pattern: &Regex) -> SceneResult<PathBuf> {
    let scene_dir = scene_dir.as_ref();

    let entries = std::fs::read_dir(scene_dir).map_err(|e| {
        SceneError::MetadataNotFound(format!("Cannot list {}: {}", scene_dir.display(), e))
    })?;

    let mut matches: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if pattern.is_match(&entry.file_name().to_string_lossy()) && entry.path().is_file() {
            matches.push(entry.path());
        }
    }
    matches.sort();

    let first = match matches.first() {
        Some(first) => first.clone(),
        None => {
            return Err(SceneError::MetadataNotFound(format!(
                "No file matching {} in {}",
                pattern.as_str(),
                scene_dir.display()
            )))
        }
    };

    if matches.len() > 1 {
        let reference = std::fs::read(&first)?;
        for other in &matches[1..] {
            if std::fs::read(other)? != reference {
                return Err(SceneError::MetadataNotFound(format!(
                    "Ambiguous descriptors in {}: {} and {} differ",
                    scene_dir.display(),
                    first.display(),
                    other.display()
                )));
            }
        }
        log::warn!(
            "{} identical descriptors in {}, using {}",
            matches.len(),
            scene_dir.display(),
            first.display()
        );
    }

    log::debug!("Scene descriptor: {}", first.display());
    Ok(first)
}

/// Node of a parsed metadata tree
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataNode {
    Group(MetadataGroup),
    Value(Value),
}

impl MetadataNode {
    pub fn as_group(&self) -> Option<&MetadataGroup> {
        match self {
            MetadataNode::Group(g) => Some(g),
            MetadataNode::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            MetadataNode::Value(v) => Some(v),
            MetadataNode::Group(_) => None,
        }
    }
}

/// Ordered mapping of keys to groups or values, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataGroup {
    entries: Vec<(String, MetadataNode)>,
}

impl MetadataGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetadataNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut MetadataNode> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace a direct child, keeping the original position on replace
    pub fn insert(&mut self, key: &str, node: MetadataNode) {
        match self.get_mut(key) {
            Some(existing) => *existing = node,
            None => self.entries.push((key.to_string(), node)),
        }
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&MetadataNode> {
        let (last, parents) = path.split_last()?;
        let mut group = self;
        for key in parents {
            group = group.get(key)?.as_group()?;
        }
        group.get(last)
    }

    pub fn group_path(&self, path: &[&str]) -> Option<&MetadataGroup> {
        if path.is_empty() {
            return Some(self);
        }
        self.get_path(path)?.as_group()
    }

    /// Set a node under an existing parent group
    pub fn set_path<S: AsRef<str>>(&mut self, path: &[S], node: MetadataNode) -> SceneResult<()> {
        let (last, parents) = path
            .split_last()
            .ok_or_else(|| SceneError::Metadata("Empty metadata path".to_string()))?;

        let mut group = self;
        for key in parents {
            group = match group.get_mut(key.as_ref()) {
                Some(MetadataNode::Group(g)) => g,
                _ => {
                    return Err(SceneError::Metadata(format!(
                        "No metadata group {} in path {}",
                        key.as_ref(),
                        join_path(path)
                    )))
                }
            };
        }
        group.insert(last.as_ref(), node);
        Ok(())
    }

    pub fn value(&self, path: &[&str]) -> SceneResult<&Value> {
        self.get_path(path)
            .and_then(MetadataNode::as_value)
            .ok_or_else(|| SceneError::Metadata(format!("Missing metadata value {}", path.join("/"))))
    }

    /// Numeric value; quoted numbers are accepted as well
    pub fn f64_value(&self, path: &[&str]) -> SceneResult<f64> {
        let value = self.value(path)?;
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        number.ok_or_else(|| {
            SceneError::Metadata(format!("{} is not numeric: {}", path.join("/"), value))
        })
    }

    pub fn str_value(&self, path: &[&str]) -> SceneResult<String> {
        match self.value(path)? {
            Value::String(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        }
    }
}

fn join_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("/")
}

/// Parse a value as a JSON literal, keeping the raw text when that fails
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parser for GROUP/END_GROUP key = value descriptors (Landsat MTL files)
pub struct MtlParser;

impl MtlParser {
    pub fn parse(content: &str) -> SceneResult<MetadataGroup> {
        let mut root = MetadataGroup::new();
        let mut group_path: Vec<String> = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with("GROUP") {
                let name = Self::split_pair(line, line_no)?.1;
                group_path.push(name.to_string());
                root.set_path(&group_path, MetadataNode::Group(MetadataGroup::new()))?;
            } else if line.starts_with("END_GROUP") {
                if group_path.pop().is_none() {
                    return Err(SceneError::Metadata(format!(
                        "Line {}: END_GROUP without open group",
                        line_no + 1
                    )));
                }
            } else if line == "END" {
                continue;
            } else {
                let (key, raw) = Self::split_pair(line, line_no)?;
                let mut path = group_path.clone();
                path.push(key.to_string());
                root.set_path(&path, MetadataNode::Value(parse_value(raw)))?;
            }
        }

        if !group_path.is_empty() {
            log::warn!("Descriptor ended with unclosed group {}", group_path.join("/"));
        }

        Ok(root)
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> SceneResult<MetadataGroup> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    fn split_pair(line: &str, line_no: usize) -> SceneResult<(&str, &str)> {
        line.split_once(" = ")
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| {
                SceneError::Metadata(format!("Line {}: expected 'KEY = VALUE', got '{}'", line_no + 1, line))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MTL: &str = r#"GROUP = L1_METADATA_FILE
  GROUP = METADATA_FILE_INFO
    ORIGIN = "Image courtesy of the U.S. Geological Survey"
    LANDSAT_PRODUCT_ID = "LC08_L1TP_199032_20150101_20170415_01_T1"
    FILE_DATE = 2017-04-15T06:06:12Z
  END_GROUP = METADATA_FILE_INFO
  GROUP = IMAGE_ATTRIBUTES
    CLOUD_COVER = 12.34
    SUN_ELEVATION = 24.5
    EARTH_SUN_DISTANCE = 0.9833
  END_GROUP = IMAGE_ATTRIBUTES
END_GROUP = L1_METADATA_FILE
END
"#;

    #[test]
    fn test_mtl_nested_groups() {
        let tree = MtlParser::parse(MTL).unwrap();
        let root = tree.group_path(&["L1_METADATA_FILE"]).unwrap();
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["METADATA_FILE_INFO", "IMAGE_ATTRIBUTES"]);

        let product_id = tree
            .str_value(&["L1_METADATA_FILE", "METADATA_FILE_INFO", "LANDSAT_PRODUCT_ID"])
            .unwrap();
        assert_eq!(product_id, "LC08_L1TP_199032_20150101_20170415_01_T1");
    }

    #[test]
    fn test_mtl_json_literal_fallback() {
        let tree = MtlParser::parse(MTL).unwrap();
        let cloud = tree
            .value(&["L1_METADATA_FILE", "IMAGE_ATTRIBUTES", "CLOUD_COVER"])
            .unwrap();
        assert!(cloud.is_number());

        // not a JSON literal, kept as raw text
        let date = tree
            .value(&["L1_METADATA_FILE", "METADATA_FILE_INFO", "FILE_DATE"])
            .unwrap();
        assert_eq!(date, &Value::String("2017-04-15T06:06:12Z".to_string()));
    }

    #[test]
    fn test_mtl_rejects_malformed_line() {
        let result = MtlParser::parse("GROUP = A\n  NOT A PAIR\nEND_GROUP = A\n");
        assert!(matches!(result, Err(SceneError::Metadata(_))));
    }

    #[test]
    fn test_set_path_requires_parent() {
        let mut tree = MetadataGroup::new();
        let missing = tree.set_path(&["A", "B"], MetadataNode::Value(Value::Null));
        assert!(missing.is_err());

        tree.set_path(&["A"], MetadataNode::Group(MetadataGroup::new())).unwrap();
        tree.set_path(&["A", "B"], MetadataNode::Value(Value::from(3))).unwrap();
        assert_eq!(tree.f64_value(&["A", "B"]).unwrap(), 3.0);
    }

    #[test]
    fn test_find_descriptor_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("B01.jp2"), b"").unwrap();

        let pattern = Regex::new(r"^MTD_(.*?)xml$").unwrap();
        let result = find_descriptor(dir.path(), &pattern);
        assert!(matches!(result, Err(SceneError::MetadataNotFound(_))));
    }

    #[test]
    fn test_find_descriptor_duplicates() {
        let dir = TempDir::new().unwrap();
        let pattern = Regex::new(r"^(.*?)MTL.txt$").unwrap();

        fs::write(dir.path().join("A_MTL.txt"), MTL).unwrap();
        fs::write(dir.path().join("B_MTL.txt"), MTL).unwrap();
        let found = find_descriptor(dir.path(), &pattern).unwrap();
        assert_eq!(found.file_name().unwrap(), "A_MTL.txt");

        fs::write(dir.path().join("C_MTL.txt"), "GROUP = OTHER\nEND_GROUP = OTHER\n").unwrap();
        let result = find_descriptor(dir.path(), &pattern);
        assert!(matches!(result, Err(SceneError::MetadataNotFound(_))));
    }
}
