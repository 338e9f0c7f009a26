use crate::types::Tier;
use std::collections::BTreeMap;

/// A GDAL subdataset: openable name plus human-readable description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdatasetRef {
    pub name: String,
    pub description: String,
}

impl SubdatasetRef {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    /// UTM zone part of the description, e.g. "UTM 31N"
    pub fn zone(&self) -> String {
        zone_identifier(&self.description)
    }
}

/// Zone identifier embedded in a subdataset description.
///
/// Everything from the first "UTM" on; descriptions without a zone yield an empty id.
pub fn zone_identifier(description: &str) -> String {
    match description.find("UTM") {
        Some(pos) => description[pos..].to_string(),
        None => String::new(),
    }
}

/// Subdatasets of a product, bucketed by the resolution named in their description
#[derive(Debug, Clone, Default)]
pub struct SubdatasetGroups {
    pub by_tier: BTreeMap<Tier, Vec<SubdatasetRef>>,
    pub unknown: Vec<SubdatasetRef>,
}

impl SubdatasetGroups {
    pub fn tier(&self, resolution: Tier) -> &[SubdatasetRef] {
        self.by_tier.get(&resolution).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Pair up the "SUBDATASET_n_NAME=..." / "SUBDATASET_n_DESC=..." entries of the
/// SUBDATASETS metadata domain, in index order.
pub fn parse_subdataset_listing(entries: &[String]) -> Vec<SubdatasetRef> {
    let mut names: BTreeMap<usize, String> = BTreeMap::new();
    let mut descs: BTreeMap<usize, String> = BTreeMap::new();

    for entry in entries {
        let (key, value) = match entry.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        let rest = match key.strip_prefix("SUBDATASET_") {
            Some(rest) => rest,
            None => continue,
        };
        let (index, field) = match rest.split_once('_') {
            Some(p) => p,
            None => continue,
        };
        let index: usize = match index.parse() {
            Ok(i) => i,
            Err(_) => continue,
        };

        match field {
            "NAME" => {
                names.insert(index, value.to_string());
            }
            "DESC" => {
                descs.insert(index, value.to_string());
            }
            _ => {}
        }
    }

    names
        .into_iter()
        .map(|(index, name)| SubdatasetRef {
            description: descs.remove(&index).unwrap_or_default(),
            name,
        })
        .collect()
}

/// Bucket subdatasets by "<res>m resolution" in their description
pub fn group_by_resolution(datasets: Vec<SubdatasetRef>, tiers: &[Tier]) -> SubdatasetGroups {
    let mut groups = SubdatasetGroups::default();
    for tier in tiers {
        groups.by_tier.insert(*tier, Vec::new());
    }

    for ds in datasets {
        let tier = tiers
            .iter()
            .find(|res| ds.description.contains(&format!("{}m resolution", res)));
        match tier {
            Some(res) => groups.by_tier.entry(*res).or_default().push(ds),
            None => groups.unknown.push(ds),
        }
    }

    groups
}
