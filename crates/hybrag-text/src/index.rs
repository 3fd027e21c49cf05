use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use hybrag_core::traits::Ranker;
use hybrag_core::types::{Ranked, SharedChunk, SourceKind};
use hybrag_core::Error;

use crate::tantivy_utils::{build_schema, register_tokenizer, CHUNK_ID, SOURCE_ID, TEXT};

const WRITER_BUDGET: usize = 50_000_000;

/// BM25 rank source over the chunk corpus.
///
/// Constructing the ranker only prepares an empty index; [`TantivyRanker::build`]
/// is the one-time initialization step. Queries before that fail with
/// `Error::IndexNotReady`.
pub struct TantivyRanker {
	index: Index,
	chunk_id_field: Field,
	source_id_field: Field,
	text_field: Field,
	loaded: Option<Loaded>,
}

struct Loaded {
	reader: IndexReader,
	by_id: HashMap<String, SharedChunk>,
}

impl TantivyRanker {
	pub fn in_ram() -> Result<Self> { Self::from_index(Index::create_in_ram(build_schema())) }

	/// Creates a fresh on-disk index. Everything already in `index_dir` is
	/// deleted; `DataSettings::validate` keeps it apart from the other data paths.
	pub fn in_dir(index_dir: PathBuf) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(&index_dir)?; }
		std::fs::create_dir_all(&index_dir)?;
		Self::from_index(Index::create_in_dir(&index_dir, build_schema())?)
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let chunk_id_field = schema.get_field(CHUNK_ID)?;
		let source_id_field = schema.get_field(SOURCE_ID)?;
		let text_field = schema.get_field(TEXT)?;
		Ok(Self { index, chunk_id_field, source_id_field, text_field, loaded: None })
	}

	pub fn build(&mut self, corpus: &[SharedChunk]) -> hybrag_core::Result<()> {
		if self.loaded.is_some() { return Err(Error::Operation("sparse index already built".to_string())); }
		self.loaded = Some(self.write_corpus(corpus)?);
		tracing::info!(chunks = corpus.len(), "sparse index built");
		Ok(())
	}

	fn write_corpus(&self, corpus: &[SharedChunk]) -> Result<Loaded> {
		let mut index_writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_BUDGET)?;
		let mut by_id = HashMap::with_capacity(corpus.len());
		for c in corpus {
			index_writer.add_document(doc!(
				self.chunk_id_field => c.chunk_id.clone(),
				self.source_id_field => c.source_id.clone(),
				self.text_field => c.content.clone(),
			))?;
			by_id.insert(c.chunk_id.clone(), Arc::clone(c));
		}
		index_writer.commit()?;
		let reader: IndexReader = self.index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Loaded { reader, by_id })
	}

	fn search_loaded(&self, loaded: &Loaded, query: &str, k: usize) -> Result<Vec<Ranked>> {
		let searcher = loaded.reader.searcher();
		let qp = QueryParser::for_index(&self.index, vec![self.text_field]);
		let (q, errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() { tracing::debug!(query, errors = errors.len(), "lenient query parse dropped clauses"); }
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			if score <= 0.0 { continue; }
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(id) = doc.get_first(self.chunk_id_field).and_then(|v| v.as_str()) else { continue };
			if let Some(chunk) = loaded.by_id.get(id) { hits.push(Ranked::new(Arc::clone(chunk), score)); }
		}
		Ok(hits)
	}
}

impl Ranker for TantivyRanker {
	fn kind(&self) -> SourceKind { SourceKind::Sparse }

	fn is_ready(&self) -> bool { self.loaded.is_some() }

	fn search(&self, query: &str, k: usize) -> hybrag_core::Result<Vec<Ranked>> {
		let loaded = self.loaded.as_ref().ok_or(Error::IndexNotReady(SourceKind::Sparse))?;
		if k == 0 { return Ok(vec![]); }
		Ok(self.search_loaded(loaded, query, k)?)
	}
}
