use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Row layout of a chunk table. Metadata is kept as a JSON object so any
/// loader-provided key survives a round trip.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
