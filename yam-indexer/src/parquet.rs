//! Arrow schemas and Parquet I/O for YAM records.
//!
//! Each [`RecordKind`] gets its own file and schema: the shared chain
//! context columns followed by the payload columns. Addresses are stored as
//! EIP-55 checksummed strings and `uint256` values as decimal strings, so
//! files stay readable by any Parquet tool without 256-bit integer support.

use std::path::Path;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use anyhow::{Context, Result, ensure};
use arrow_array::{Array, ArrayRef, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use yam::LogContext;
use yam::record::{
    AnyRecord, OfferAcceptedPayload, OfferCreatedPayload, OfferDeletedPayload,
    OfferUpdatedPayload, Record, RecordKind,
};

/// Payload columns of each kind, in file order. All are `Utf8`.
const fn payload_columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::OfferCreated | RecordKind::OfferAccepted => &[
            "offer_token",
            "buyer_token",
            "seller",
            "buyer",
            "offer_id",
            "price",
            "amount",
        ],
        RecordKind::OfferDeleted => &["offer_id"],
        RecordKind::OfferUpdated => &[
            "offer_id",
            "old_price",
            "new_price",
            "old_amount",
            "new_amount",
        ],
    }
}

/// Arrow schema of one record kind.
#[must_use]
pub fn schema(kind: RecordKind) -> Arc<Schema> {
    let mut fields = vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("transaction_hash", DataType::Utf8, false),
        Field::new("log_index", DataType::UInt64, false),
        Field::new("block_number", DataType::UInt64, false),
        Field::new("timestamp", DataType::UInt64, false),
    ];
    fields.extend(
        payload_columns(kind)
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, false)),
    );
    Arc::new(Schema::new(fields))
}

/// Payload values of a record, matching [`payload_columns`].
fn payload_values(record: &AnyRecord) -> Vec<String> {
    let addr = |a: Address| a.to_checksum(None);
    match record {
        AnyRecord::OfferCreated(Record { payload: p, .. }) => vec![
            addr(p.offer_token),
            addr(p.buyer_token),
            addr(p.seller),
            addr(p.buyer),
            p.offer_id.to_string(),
            p.price.to_string(),
            p.amount.to_string(),
        ],
        AnyRecord::OfferAccepted(Record { payload: p, .. }) => vec![
            addr(p.offer_token),
            addr(p.buyer_token),
            addr(p.seller),
            addr(p.buyer),
            p.offer_id.to_string(),
            p.price.to_string(),
            p.amount.to_string(),
        ],
        AnyRecord::OfferDeleted(Record { payload: p, .. }) => vec![p.offer_id.to_string()],
        AnyRecord::OfferUpdated(Record { payload: p, .. }) => vec![
            p.offer_id.to_string(),
            p.old_price.to_string(),
            p.new_price.to_string(),
            p.old_amount.to_string(),
            p.new_amount.to_string(),
        ],
    }
}

/// Convert records of a single kind into a columnar [`RecordBatch`].
///
/// # Errors
///
/// Returns an error if a record of another kind is passed in, or if the
/// Arrow `RecordBatch` construction fails.
pub fn records_to_batch(kind: RecordKind, records: &[&AnyRecord]) -> Result<RecordBatch> {
    let cap = records.len();
    let mut ids = Vec::with_capacity(cap);
    let mut tx_hashes = Vec::with_capacity(cap);
    let mut log_indices = Vec::with_capacity(cap);
    let mut block_numbers = Vec::with_capacity(cap);
    let mut timestamps = Vec::with_capacity(cap);
    let mut payload: Vec<Vec<String>> = payload_columns(kind)
        .iter()
        .map(|_| Vec::with_capacity(cap))
        .collect();

    for record in records {
        ensure!(
            record.kind() == kind,
            "record {} is {}, expected {kind}",
            record.id(),
            record.kind()
        );
        let ctx = record.context();
        ids.push(record.id().to_owned());
        tx_hashes.push(format!("{:#x}", ctx.transaction_hash));
        log_indices.push(ctx.log_index);
        block_numbers.push(ctx.block_number);
        timestamps.push(ctx.timestamp);
        for (column, value) in payload.iter_mut().zip(payload_values(record)) {
            column.push(value);
        }
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(tx_hashes)),
        Arc::new(UInt64Array::from(log_indices)),
        Arc::new(UInt64Array::from(block_numbers)),
        Arc::new(UInt64Array::from(timestamps)),
    ];
    columns.extend(
        payload
            .into_iter()
            .map(|values| Arc::new(StringArray::from(values)) as ArrayRef),
    );

    Ok(RecordBatch::try_new(schema(kind), columns)?)
}

/// One row of a batch, with typed column accessors.
struct Row<'a> {
    batch: &'a RecordBatch,
    index: usize,
}

impl<'a> Row<'a> {
    fn column<T: Array + 'static>(&self, name: &str) -> Result<&'a T> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<T>())
            .with_context(|| format!("missing or mistyped column `{name}`"))
    }

    fn str(&self, name: &str) -> Result<&'a str> {
        Ok(self.column::<StringArray>(name)?.value(self.index))
    }

    fn u64(&self, name: &str) -> Result<u64> {
        Ok(self.column::<UInt64Array>(name)?.value(self.index))
    }

    fn hash(&self, name: &str) -> Result<B256> {
        let s = self.str(name)?;
        s.parse()
            .with_context(|| format!("column `{name}`: invalid hash {s:?}"))
    }

    fn address(&self, name: &str) -> Result<Address> {
        let s = self.str(name)?;
        s.parse()
            .with_context(|| format!("column `{name}`: invalid address {s:?}"))
    }

    fn uint(&self, name: &str) -> Result<U256> {
        let s = self.str(name)?;
        U256::from_str_radix(s, 10)
            .with_context(|| format!("column `{name}`: invalid uint256 {s:?}"))
    }

    fn to_record(&self, kind: RecordKind) -> Result<AnyRecord> {
        let context = LogContext {
            transaction_hash: self.hash("transaction_hash")?,
            log_index: self.u64("log_index")?,
            block_number: self.u64("block_number")?,
            timestamp: self.u64("timestamp")?,
        };
        let record: AnyRecord = match kind {
            RecordKind::OfferCreated => Record::new(
                &context,
                OfferCreatedPayload {
                    offer_token: self.address("offer_token")?,
                    buyer_token: self.address("buyer_token")?,
                    seller: self.address("seller")?,
                    buyer: self.address("buyer")?,
                    offer_id: self.uint("offer_id")?,
                    price: self.uint("price")?,
                    amount: self.uint("amount")?,
                },
            )
            .into(),
            RecordKind::OfferAccepted => Record::new(
                &context,
                OfferAcceptedPayload {
                    offer_token: self.address("offer_token")?,
                    buyer_token: self.address("buyer_token")?,
                    seller: self.address("seller")?,
                    buyer: self.address("buyer")?,
                    offer_id: self.uint("offer_id")?,
                    price: self.uint("price")?,
                    amount: self.uint("amount")?,
                },
            )
            .into(),
            RecordKind::OfferDeleted => Record::new(
                &context,
                OfferDeletedPayload {
                    offer_id: self.uint("offer_id")?,
                },
            )
            .into(),
            RecordKind::OfferUpdated => Record::new(
                &context,
                OfferUpdatedPayload {
                    offer_id: self.uint("offer_id")?,
                    old_price: self.uint("old_price")?,
                    new_price: self.uint("new_price")?,
                    old_amount: self.uint("old_amount")?,
                    new_amount: self.uint("new_amount")?,
                },
            )
            .into(),
        };

        let stored_id = self.str("id")?;
        ensure!(
            record.id() == stored_id,
            "stored id {stored_id} does not match its transaction hash and log index"
        );
        Ok(record)
    }
}

/// Convert a [`RecordBatch`] read from a `kind` file back into records.
///
/// # Errors
///
/// Returns an error if a column is missing, mistyped or unparsable, or if
/// a stored id disagrees with the row's transaction hash and log index.
pub fn batch_to_records(kind: RecordKind, batch: &RecordBatch) -> Result<Vec<AnyRecord>> {
    (0..batch.num_rows())
        .map(|index| {
            Row { batch, index }
                .to_record(kind)
                .with_context(|| format!("{kind} row {index}"))
        })
        .collect()
}

/// Read all existing record batches from a Parquet file.
///
/// Returns an empty vec if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn read(path: &Path) -> Result<Vec<RecordBatch>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet header: {}", path.display()))?
        .build()
        .with_context(|| format!("building parquet reader: {}", path.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("reading batches from {}", path.display()))
}

/// Write record batches of `kind` to a Parquet file using Zstd compression.
///
/// Uses atomic write (temp file + rename) to prevent corruption.
///
/// # Errors
///
/// Returns an error on I/O failure or if the Parquet writer rejects the data.
pub fn write(path: &Path, kind: RecordKind, batches: &[RecordBatch]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("parquet.tmp");
    let file =
        std::fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(
            parquet::basic::ZstdLevel::try_new(3).context("invalid zstd level")?,
        ))
        .build();

    let mut writer = ArrowWriter::try_new(file, schema(kind), Some(props))?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;

    std::fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;

    Ok(())
}
