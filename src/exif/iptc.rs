//! IPTC-IIM records, as carried in a JPEG APP13 "Photoshop 3.0" segment
//! (8BIM resource 0x0404) or in the TIFF IPTC-NAA tag.

pub const APP13_HEADER: &[u8] = b"Photoshop 3.0\0";
const IPTC_8BIM: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;
const RECORD_MARKER: u8 = 0x1C;

pub const KEYWORDS: (u8, u8) = (2, 25);
const RECORD_VERSION: (u8, u8) = (2, 0);

/// One IIM dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IptcRecord {
    pub record: u8,
    pub dataset: u8,
    pub data: Vec<u8>,
}

/// Decoded APP13 payload: IIM datasets plus every other Photoshop resource, verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptcBlock {
    other_resources: Vec<u8>,
    records: Vec<IptcRecord>,
}

impl IptcBlock {
    /// Parse APP13 segment contents (starting with the Photoshop header).
    pub fn from_app13(contents: &[u8]) -> Self {
        let mut block = IptcBlock::default();
        let Some(data) = contents.strip_prefix(APP13_HEADER) else {
            return block;
        };

        let mut pos = 0;
        while pos + 12 <= data.len() {
            if &data[pos..pos + 4] != IPTC_8BIM {
                log::debug!("APP13: unexpected resource signature at {pos}, stopping");
                break;
            }
            let resource_id = u16::from_be_bytes([data[pos + 4], data[pos + 5]]);
            // Pascal name: length byte + name, padded to even
            let name_len = data[pos + 6] as usize;
            let name_padded = if (name_len + 1) % 2 == 0 { name_len + 1 } else { name_len + 2 };
            let data_start = pos + 6 + name_padded;
            let Some(len_bytes) = data.get(data_start..data_start + 4) else { break };
            let len_bytes = [len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]];
            let data_len = u32::from_be_bytes(len_bytes) as usize;
            let body_start = data_start + 4;
            let body_end = body_start.saturating_add(data_len).min(data.len());
            let padded_end = if data_len % 2 == 0 { body_end } else { body_end + 1 };
            let resource_end = padded_end.min(data.len());

            if resource_id == IPTC_RESOURCE_ID {
                block.records = parse_records(&data[body_start..body_end]);
            } else {
                block.other_resources.extend_from_slice(&data[pos..resource_end]);
            }
            pos = resource_end;
        }
        block
    }

    /// Parse bare IIM data (the TIFF IPTC-NAA tag payload).
    pub fn from_iim(data: &[u8]) -> Self {
        IptcBlock { other_resources: Vec::new(), records: parse_records(data) }
    }

    pub fn records(&self) -> &[IptcRecord] {
        &self.records
    }

    pub fn keywords(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| (r.record, r.dataset) == KEYWORDS)
            .map(|r| String::from_utf8_lossy(&r.data).trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }

    /// Replace all keyword datasets. An empty list removes them.
    pub fn set_keywords(&mut self, keywords: &[String]) {
        self.records.retain(|r| (r.record, r.dataset) != KEYWORDS);
        if keywords.is_empty() {
            return;
        }
        if !self.records.iter().any(|r| (r.record, r.dataset) == RECORD_VERSION) {
            self.records.push(IptcRecord { record: 2, dataset: 0, data: vec![0x00, 0x04] });
        }
        for keyword in keywords {
            let bytes = keyword.as_bytes();
            let len = bytes.len().min(u16::MAX as usize >> 1);
            self.records.push(IptcRecord { record: 2, dataset: 25, data: bytes[..len].to_vec() });
        }
        // ascending record number, version dataset first within its record
        self.records.sort_by_key(|r| (r.record, r.dataset != 0));
    }

    /// True when nothing besides the record version would be written.
    pub fn is_empty(&self) -> bool {
        self.other_resources.is_empty() && !self.has_datasets()
    }

    fn has_datasets(&self) -> bool {
        self.records.iter().any(|r| (r.record, r.dataset) != RECORD_VERSION)
    }

    /// Build APP13 segment contents.
    pub fn to_app13(&self) -> Vec<u8> {
        let mut result = Vec::new();
        result.extend_from_slice(APP13_HEADER);
        result.extend_from_slice(&self.other_resources);

        if self.has_datasets() {
            let iim = self.iim_bytes();
            result.extend_from_slice(IPTC_8BIM);
            result.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
            result.push(0x00); // empty pascal name
            result.push(0x00); // padding to even
            result.extend_from_slice(&(iim.len() as u32).to_be_bytes());
            result.extend_from_slice(&iim);
            if iim.len() % 2 != 0 {
                result.push(0x00);
            }
        }
        result
    }

    fn iim_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for r in &self.records {
            out.push(RECORD_MARKER);
            out.push(r.record);
            out.push(r.dataset);
            out.extend_from_slice(&(r.data.len() as u16).to_be_bytes());
            out.extend_from_slice(&r.data);
        }
        out
    }
}

fn parse_records(data: &[u8]) -> Vec<IptcRecord> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos + 5 <= data.len() {
        if data[pos] != RECORD_MARKER {
            // trailing padding
            break;
        }
        let record = data[pos + 1];
        let dataset = data[pos + 2];
        let len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]);
        if len & 0x8000 != 0 {
            log::debug!("IPTC: extended dataset {record}:{dataset} not supported, stopping");
            break;
        }
        let start = pos + 5;
        let Some(body) = data.get(start..start + len as usize) else {
            log::debug!("IPTC: dataset {record}:{dataset} truncated");
            break;
        };
        records.push(IptcRecord { record, dataset, data: body.to_vec() });
        pos = start + len as usize;
    }
    records
}
