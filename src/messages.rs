//! The HL7 messages a run cycles through.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::ConfigError;

/// Ordered, non-empty, immutable list of HL7 messages with `\r` segment
/// separators.
#[derive(Debug, Clone)]
pub struct MessageSet(Vec<String>);

impl MessageSet {
    pub fn new(messages: Vec<String>) -> Result<Self, ConfigError> {
        if messages.is_empty() {
            return Err(ConfigError::EmptyMessageSet);
        }
        Ok(Self(messages))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Built-in sample traffic, stamped with `now` as the message date/time.
pub fn sample_messages(now: DateTime<Local>) -> MessageSet {
    let ts = now.format("%Y%m%d%H%M%S").to_string();
    let document = base64::encode(sample_document(&ts));

    let messages = vec![
        format!(
            "MSH|^~\\&|LOADGEN|HOSP|ADT_RECV|HOSP|{ts}||ADT^A01^ADT_A01|ADT0001|P|2.5\r\
             EVN|A01|{ts}\r\
             PID|1||100001^^^HOSP^MR||DOE^JOHN^A||19800101|M|||1 MAIN ST^^SPRINGFIELD^IL^62701\r\
             PV1|1|I|WARD1^101^A|||||1234^SMITH^JANE|||MED"
        ),
        format!(
            "MSH|^~\\&|LOADGEN|LAB|LIS_RECV|HOSP|{ts}||ORU^R01^ORU_R01|ORU0001|P|2.5\r\
             PID|1||100002^^^HOSP^MR||ROE^JANE||19750512|F\r\
             OBR|1|ORD100|FIL100|24331-1^LIPID PANEL^LN|||{ts}\r\
             OBX|1|NM|2093-3^CHOLESTEROL^LN||185|mg/dL|<200|N|||F\r\
             OBX|2|NM|2571-8^TRIGLYCERIDES^LN||120|mg/dL|<150|N|||F"
        ),
        format!(
            "MSH|^~\\&|LOADGEN|HOSP|DOC_RECV|HOSP|{ts}||MDM^T02^MDM_T02|MDM0001|P|2.5\r\
             EVN|T02|{ts}\r\
             PID|1||100003^^^HOSP^MR||POE^ALEX||19900220|U\r\
             TXA|1|DS|TX|{ts}|||||||||DOC0001||||||AU\r\
             OBX|1|ED|PDF^Application^PDF^Base64||^application^pdf^Base64^{document}|||||F"
        ),
        format!(
            "MSH|^~\\&|LOADGEN|HOSP|SCHED_RECV|HOSP|{ts}||SIU^S12^SIU_S12|SIU0001|P|2.5\r\
             SCH|APT0001|APT0001|||||ROUTINE|||30|m|^^30^{ts}\r\
             PID|1||100004^^^HOSP^MR||LOE^SAM||19651130|M\r\
             AIS|1||CONSULT^Consultation"
        ),
    ];
    MessageSet(messages)
}

fn sample_document(ts: &str) -> Vec<u8> {
    format!(
        "%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n% generated {ts}\ntrailer << /Root 1 0 R >>\n%%EOF\n"
    )
    .into_bytes()
}

/// Reads one HL7 message per file. Line endings are normalized to the HL7
/// segment separator.
pub fn load_messages<P: AsRef<Path>>(paths: &[P]) -> Result<MessageSet, ConfigError> {
    let messages = paths
        .iter()
        .map(|path| load_message(path.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    MessageSet::new(messages)
}

fn load_message(path: &Path) -> Result<String, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::MessageFile {
        path: PathBuf::from(path),
        source,
    })?;
    let message = normalize_segments(&raw);
    if message.is_empty() {
        return Err(ConfigError::EmptyMessageFile(PathBuf::from(path)));
    }
    Ok(message)
}

fn normalize_segments(raw: &str) -> String {
    raw.replace("\r\n", "\r")
        .replace('\n', "\r")
        .trim_end_matches(['\r', ' ', '\t'])
        .to_string()
}
