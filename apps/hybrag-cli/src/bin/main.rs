use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use hybrag_core::chunker::Chunker;
use hybrag_core::config::{expand_path, Config, Settings};
use hybrag_core::corpus::{load_corpus, load_qa_dataset, save_corpus, save_qa_dataset, write_json};
use hybrag_core::types::QaRecord;
use hybrag_eval::ablation::save_report;
use hybrag_eval::{default_configs, AblationStudy, ErrorAnalyzer, EvaluationRunner, QaGenerator};
use hybrag_hybrid::{DetailedRetrieval, ExtractiveGenerator, HybridRetriever, RagService};
use hybrag_text::TantivyRanker;
use hybrag_vector::{FlatVectorIndex, HashingEmbedder};

const USAGE: &str = "<ingest|query|ask|ablation|evaluate|errors|gen-qa> [args...]";

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HYBRAG_LOG").unwrap_or_else(|_| EnvFilter::new(if env::var("DEBUG").is_ok() { "hybrag=debug,info" } else { "info,tantivy=warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).compact().with_writer(std::io::stderr).init();
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() { eprintln!("Usage: {} {}", prog, USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

/// First argument that is not a flag or a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut i = 0; while i < args.len() {
        if args[i] == "--sample" || args[i] == "--limit" { i += 2; continue; }
        if !args[i].starts_with('-') { return Some(&args[i]); }
        i += 1;
    }
    None
}

fn number_flag(args: &[String], flag: &str) -> Option<usize> {
    let idx = args.iter().position(|a| a == flag)?;
    match args.get(idx + 1).and_then(|v| v.parse::<usize>().ok()) {
        Some(n) => Some(n),
        None => { eprintln!("Error: {} requires a number", flag); std::process::exit(1) }
    }
}

fn has_flag(args: &[String], flag: &str) -> bool { args.iter().any(|a| a == flag) }

fn require_query<'a>(args: &'a [String], cmd: &str) -> &'a str {
    positional(args).unwrap_or_else(|| { eprintln!("Usage: hybrag {} \"<query>\"", cmd); std::process::exit(1) })
}

fn build_retriever(settings: &Settings) -> anyhow::Result<HybridRetriever> {
    let corpus = load_corpus(&expand_path(&settings.data.corpus_path))?;
    println!("Loaded {} chunks", corpus.len());
    let mut sparse = match &settings.data.tantivy_index_dir {
        Some(dir) => TantivyRanker::in_dir(expand_path(dir))?,
        None => TantivyRanker::in_ram()?,
    };
    sparse.build(&corpus)?;
    let mut dense = FlatVectorIndex::new(Box::new(HashingEmbedder::default()));
    dense.build(&corpus)?;
    Ok(HybridRetriever::new(Arc::new(dense), Arc::new(sparse), &settings.retrieval)?)
}

fn build_rag(settings: &Settings) -> anyhow::Result<RagService> {
    Ok(RagService::new(build_retriever(settings)?, Arc::new(ExtractiveGenerator), &settings.generation))
}

fn load_questions(settings: &Settings, args: &[String]) -> anyhow::Result<Vec<QaRecord>> {
    let mut questions = load_qa_dataset(&expand_path(&settings.data.qa_path))?;
    if let Some(n) = number_flag(args, "--sample").or(settings.evaluation.sample_size) { questions.truncate(n); }
    println!("Evaluating {} questions", questions.len());
    Ok(questions)
}

fn report_path(settings: &Settings, name: &str) -> PathBuf { expand_path(&settings.data.data_dir).join(name) }

fn print_detailed(d: &DetailedRetrieval) {
    println!("\n🔍 {} results for: \"{}\" (dense {} / sparse {} candidates)", d.hits.len(), d.query, d.dense_candidates, d.sparse_candidates);
    for (i, h) in d.hits.iter().enumerate() {
        let fmt_src = |rank: Option<usize>, score: Option<f32>| match (rank, score) { (Some(r), Some(s)) => format!("#{r} ({s:.4})"), _ => "-".to_string() };
        println!("\n  {}. rrf={:.5}  dense={}  sparse={}  source={}", i + 1, h.rrf_score, fmt_src(h.dense_rank, h.dense_score), fmt_src(h.sparse_rank, h.sparse_score), h.chunk.source_id);
        println!("     📝 {}", hybrag_hybrid::generate::truncate_chars(&h.chunk.content, 160));
    }
    let t = d.timing;
    println!("\n⏱  dense {:.1}ms  sparse {:.1}ms  fusion {:.2}ms  total {:.1}ms", t.dense_ms, t.sparse_ms, t.fusion_ms, t.total_ms);
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    tracing::debug!(env = config.env_name(), ?settings, "configuration loaded");
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let data_dir = positional(&args).map(PathBuf::from).unwrap_or_else(|| expand_path(&settings.data.raw_txt_dir));
            println!("Ingesting from {}", data_dir.display());
            let chunker = Chunker::new(settings.chunking)?;
            let chunks = match number_flag(&args, "--limit") {
                Some(limit) => { println!("🔢 Limiting to {} files", limit); chunker.chunk_directory_limited(&data_dir, limit)? }
                None => chunker.chunk_directory(&data_dir)?,
            };
            let corpus_path = expand_path(&settings.data.corpus_path);
            save_corpus(&corpus_path, &chunks)?;
            println!("✅ Ingest complete ({} chunks) -> {}", chunks.len(), corpus_path.display());
        }
        "query" => {
            let query = require_query(&args, "query");
            let retriever = build_retriever(&settings)?;
            let detailed = if has_flag(&args, "--concurrent") {
                tokio::runtime::Runtime::new()?.block_on(retriever.retrieve_detailed_concurrent(query))?
            } else {
                retriever.retrieve_detailed(query)?
            };
            if has_flag(&args, "--json") { println!("{}", serde_json::to_string_pretty(&detailed)?); } else { print_detailed(&detailed); }
        }
        "ask" => {
            let query = require_query(&args, "ask");
            let rag = build_rag(&settings)?;
            let answer = rag.answer_detailed(query)?;
            println!("\nQ: {}\nA: {}", answer.query, answer.answer);
            println!("\n📚 Sources:"); for (i, h) in answer.hits.iter().enumerate() { println!("  {}. {} ({})", i + 1, h.chunk.title, h.chunk.source_id); }
            println!("\n⏱  retrieval {:.1}ms  generation {:.1}ms", answer.timing.total_ms, answer.generation_ms);
        }
        "ablation" => {
            let retriever = build_retriever(&settings)?;
            let questions = load_questions(&settings, &args)?;
            let study = AblationStudy::new(&retriever);
            let report = study.run(&default_configs(&settings.evaluation.ablation_k_values), &questions)?;
            println!("\n{:<16} {:>8} {:>10} {:>8}", "Method", "MRR", "Evaluated", "Failed");
            for entry in &report.leaderboard {
                let m = report.methods[&entry.name];
                println!("{:<16} {:>8.4} {:>10} {:>8}", entry.name, m.mrr, m.n_evaluated, m.n_failed);
            }
            if let Some(a) = &report.analysis {
                println!("\nBest: {} ({:.4})  Worst: {} ({:.4})", a.best_method, a.best_mrr, a.worst_method, a.worst_mrr);
                println!("Dense vs sparse: {}  Hybrid improvement: {:+.2}%", a.dense_vs_sparse, a.hybrid_improvement_pct);
                println!("💡 {}", a.recommendation);
            }
            let path = report_path(&settings, "ablation_results.json");
            save_report(&path, &report)?;
            println!("\nResults saved to {}", path.display());
        }
        "evaluate" => {
            let rag = build_rag(&settings)?;
            let questions = load_questions(&settings, &args)?;
            let report = EvaluationRunner::new(&rag).run(&questions)?;
            println!("\nMRR: {:.4}  ({} evaluated, {} failed)", report.mrr, report.n_evaluated, report.n_failed);
            for (name, score) in &report.mean_scores { println!("{}: {:.4}", name, score); }
            let path = report_path(&settings, "evaluation_results.json");
            report.save(&path)?;
            println!("Results saved to {}", path.display());
        }
        "errors" => {
            let rag = build_rag(&settings)?;
            let questions = load_questions(&settings, &args)?;
            let report = ErrorAnalyzer::new(&rag, settings.evaluation.min_answer_chars).analyze(&questions)?;
            let s = &report.summary;
            println!("\nTotal Questions: {} ({} failed)", s.total_questions, s.n_failed);
            println!("Success Rate: {}%\nRetrieval Accuracy: {}%", s.success_rate, s.retrieval_accuracy);
            println!("\nError Breakdown:"); for (cat, stat) in &s.categories { println!("  {:<20} {:>5} ({}%)", cat.as_str(), stat.count, stat.percentage); }
            println!("\nRecommendations:"); for r in &report.recommendations { println!("  • {}", r); }
            let path = report_path(&settings, "error_analysis.json");
            write_json(&path, &report)?;
            println!("\nError analysis saved to {}", path.display());
        }
        "gen-qa" => {
            let corpus = load_corpus(&expand_path(&settings.data.corpus_path))?;
            let n = number_flag(&args, "--sample").unwrap_or(settings.evaluation.qa_samples);
            let generator = QaGenerator::new(Arc::new(ExtractiveGenerator), settings.generation.strategy.into(), settings.evaluation.seed);
            let (records, failed) = generator.generate_dataset(&corpus, n);
            let qa_path = expand_path(&settings.data.qa_path);
            save_qa_dataset(&qa_path, &records)?;
            println!("Generated {} valid Q&A pairs ({} failed/filtered) -> {}", records.len(), failed, qa_path.display());
        }
        _ => { eprintln!("Unknown command: {}\nUsage: hybrag {}", cmd, USAGE); std::process::exit(1); }
    }
    Ok(())
}
