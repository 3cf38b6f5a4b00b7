//! Raw feed entries → `LineRecord` batch → Arrow `RecordBatch`

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use uuid::Uuid;

use crate::config::SOURCE_SYSTEM;
use crate::feed::{FeedDocument, RawLineEntry};
use crate::schema;

/// Accepted values of `TransportType`. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    Bus,
    Train,
    Metro,
    Boat,
    Tram,
}

impl TransportType {
    pub const ALL: [Self; 5] = [Self::Bus, Self::Train, Self::Metro, Self::Boat, Self::Tram];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bus => "BUS",
            Self::Train => "TRAIN",
            Self::Metro => "METRO",
            Self::Boat => "BOAT",
            Self::Tram => "TRAM",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or(())
    }
}

/// Canonical line row. `load_timestamp` is assigned by the warehouse at merge.
///
/// Required columns that arrive null are carried as `None`; the stager
/// rejects such batches before anything reaches the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub uuid_line: Uuid,
    pub pk_line_id: String,
    pub line_name: Option<String>,
    pub transport_type: Option<TransportType>,
    pub line_public_number: Option<String>,
    pub data_owner_code: Option<String>,
    pub destination_name_50: Option<String>,
    pub line_planning_number: Option<String>,
    pub line_direction: Option<i64>,
    pub source_system: &'static str,
}

/// Records of one run, in feed order
pub type Batch = Vec<LineRecord>;

impl LineRecord {
    /// Build a record from one raw entry, with a fresh `uuid_line`.
    ///
    /// Second value is `true` when a non-null `TransportType` was coerced to null.
    pub fn from_raw(pk_line_id: String, raw: RawLineEntry) -> (Self, bool) {
        let transport_type = raw.transport_type.as_deref().map(str::parse::<TransportType>);
        let coerced = matches!(transport_type, Some(Err(())));
        if coerced {
            log::debug!(
                "line {pk_line_id}: TransportType {:?} not recognized, set to null",
                raw.transport_type.as_deref().unwrap_or_default()
            );
        }

        let record = Self {
            uuid_line: Uuid::new_v4(),
            pk_line_id,
            line_name: raw.line_name,
            transport_type: transport_type.and_then(Result::ok),
            line_public_number: raw.line_public_number,
            data_owner_code: raw.data_owner_code,
            destination_name_50: raw.destination_name_50,
            line_planning_number: raw.line_planning_number,
            line_direction: raw.line_direction,
            source_system: SOURCE_SYSTEM,
        };
        (record, coerced)
    }
}

/// Map every feed entry to a `LineRecord`. Never fails.
pub fn transform(feed: FeedDocument) -> Batch {
    let mut coerced = 0usize;
    let batch: Batch = feed
        .entries
        .into_iter()
        .map(|(id, raw)| {
            let (record, was_coerced) = LineRecord::from_raw(id, raw);
            coerced += usize::from(was_coerced);
            record
        })
        .collect();

    if coerced > 0 {
        log::info!(
            "{coerced} of {} lines had an unrecognized TransportType, stored as null",
            batch.len()
        );
    }
    batch
}

/// Column buffers for the artifact schema
pub struct LineAccumulator {
    schema: Arc<Schema>,
    uuid_line: Vec<String>,
    pk_line_id: Vec<String>,
    line_name: Vec<Option<String>>,
    transport_type: Vec<Option<&'static str>>,
    line_public_number: Vec<Option<String>>,
    data_owner_code: Vec<Option<String>>,
    destination_name_50: Vec<Option<String>>,
    line_planning_number: Vec<Option<String>>,
    line_direction: Vec<Option<i64>>,
    source_system: Vec<&'static str>,
}

impl Default for LineAccumulator {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl LineAccumulator {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            schema: schema::artifact().clone(),
            uuid_line: Vec::with_capacity(n),
            pk_line_id: Vec::with_capacity(n),
            line_name: Vec::with_capacity(n),
            transport_type: Vec::with_capacity(n),
            line_public_number: Vec::with_capacity(n),
            data_owner_code: Vec::with_capacity(n),
            destination_name_50: Vec::with_capacity(n),
            line_planning_number: Vec::with_capacity(n),
            line_direction: Vec::with_capacity(n),
            source_system: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, row: LineRecord) {
        self.uuid_line.push(row.uuid_line.to_string());
        self.pk_line_id.push(row.pk_line_id);
        self.line_name.push(row.line_name);
        let transport_type = row.transport_type.map(TransportType::as_str);
        self.transport_type.push(transport_type);
        self.line_public_number.push(row.line_public_number);
        self.data_owner_code.push(row.data_owner_code);
        self.destination_name_50.push(row.destination_name_50);
        self.line_planning_number.push(row.line_planning_number);
        self.line_direction.push(row.line_direction);
        self.source_system.push(row.source_system);
    }

    pub fn len(&self) -> usize {
        self.pk_line_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain buffered rows into a `RecordBatch` matching [`schema::artifact`].
    ///
    /// Fails if a non-nullable column holds a null.
    pub fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            take_strings(&mut self.uuid_line),
            take_strings(&mut self.pk_line_id),
            take_strings(&mut self.line_name),
            take_strings(&mut self.transport_type),
            take_strings(&mut self.line_public_number),
            take_strings(&mut self.data_owner_code),
            take_strings(&mut self.destination_name_50),
            take_strings(&mut self.line_planning_number),
            Arc::new(Int64Array::from(std::mem::take(&mut self.line_direction))),
            take_strings(&mut self.source_system),
        ];
        RecordBatch::try_new(self.schema.clone(), columns)
    }
}

fn take_strings<T>(buf: &mut Vec<T>) -> ArrayRef
where
    StringArray: From<Vec<T>>,
{
    Arc::new(StringArray::from(std::mem::take(buf)))
}
