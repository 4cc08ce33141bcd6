//! The content pipeline wired onto the graph engine.
//!
//! ```text
//! parser -> qa -> content -> critique =(approved)=> comparison -> [index ->] assembler
//!                   ^                  |
//!                   +---(revise)-------+---(revision cap exceeded)=> END
//! ```

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use pageflow_core::config::{AppConfig, TemplateSet};
use pageflow_core::error::Result;
use pageflow_core::traits::{Capability, Refiner, Retriever};
use pageflow_core::types::{Comparison, Documents, Product, QaItem, RawInput, RunId, RunMeta};

use crate::assembler::AssemblerAgent;
use crate::comparison::ComparisonAgent;
use crate::content::{Blocks, ContentBlockAgent};
use crate::critique::{route_after_critique, CritiqueAgent};
use crate::graph::{Node, NodeOutput, State, StateDelta, StateGraph};
use crate::parser::ParserAgent;
use crate::qa::QaGenerator;
use crate::retrieval::RetrievalAgent;

/// Node names.
pub mod nodes {
    pub const PARSER: &str = "parser";
    pub const QA: &str = "qa";
    pub const CONTENT: &str = "content";
    pub const CRITIQUE: &str = "critique";
    pub const COMPARISON: &str = "comparison";
    pub const INDEX: &str = "index";
    pub const ASSEMBLER: &str = "assembler";
}

/// State field names.
pub mod fields {
    pub const RAW_INPUT: &str = "raw_input";
    pub const RUN_ID: &str = "run_id";
    pub const TIMESTAMP: &str = "timestamp";
    pub const APPROVED: &str = "approved";
    pub const PRODUCT: &str = "product";
    pub const QA_PAIRS: &str = "qa_pairs";
    pub const BLOCKS: &str = "blocks";
    pub const CRITIQUE: &str = "critique";
    pub const REVISIONS: &str = "revisions";
    pub const COMPARISON: &str = "comparison";
    pub const RETRIEVAL: &str = "retrieval";
    pub const DOCUMENTS: &str = "documents";
}

/// Tunables for one pipeline build.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_steps: usize,
    pub min_qa_items: usize,
    pub target_qa_items: usize,
    pub required_blocks: Vec<String>,
    /// `None` leaves the revision loop bounded only by `max_steps`.
    pub max_revisions: Option<usize>,
    pub templates: TemplateSet,
    pub probe_query: String,
    pub top_k: usize,
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let pipeline = &config.pipeline;
        let mut options = Self {
            max_steps: pipeline.max_steps,
            min_qa_items: pipeline.min_qa_items,
            target_qa_items: pipeline.target_qa_items,
            required_blocks: pipeline.required_blocks.clone(),
            max_revisions: Some(pipeline.max_revisions),
            templates: config.templates.clone(),
            ..Self::default()
        };
        if let Some(ref retrieval) = config.retrieval {
            options.probe_query = retrieval.probe_query.clone();
            options.top_k = retrieval.top_k;
        }
        options
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_steps: crate::graph::DEFAULT_MAX_STEPS,
            min_qa_items: 10,
            target_qa_items: 15,
            required_blocks: vec!["benefits_block".to_string(), "usage_block".to_string()],
            max_revisions: Some(3),
            templates: TemplateSet::default(),
            probe_query: "How to use the product?".to_string(),
            top_k: 3,
        }
    }
}

/// Optional collaborators, each decided once before the graph is built.
pub struct Collaborators {
    pub refiner: Capability<Box<dyn Refiner>>,
    pub retriever: Capability<Box<dyn Retriever>>,
}

impl Collaborators {
    /// No refinement, no retrieval.
    pub fn none() -> Self {
        Self {
            refiner: Capability::unavailable("refinement disabled"),
            retriever: Capability::unavailable("retrieval disabled"),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::none()
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Critique approved the content and the documents were assembled.
    Approved,
    /// The revision cap was exceeded before critique approved.
    /// `revisions` counts QA re-runs, one less than the rejections recorded
    /// in state since the final rejection ends the run instead.
    Unresolved { critique: String, revisions: u64 },
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub meta: RunMeta,
    pub outcome: RunOutcome,
    /// Present only for approved runs.
    pub documents: Option<Documents>,
    pub state: State,
    pub path: Vec<String>,
}

impl PipelineRun {
    pub fn is_approved(&self) -> bool {
        self.outcome == RunOutcome::Approved
    }
}

/// Initial state for one run.
pub fn seed_state(raw: &RawInput, meta: &RunMeta) -> State {
    let mut state = State::new();
    state.set(fields::RAW_INPUT, serde_json::Value::Object(raw.clone()));
    state.set_str(fields::RUN_ID, meta.run_id.to_string());
    state.set_str(fields::TIMESTAMP, meta.timestamp_rfc3339());
    state.set(fields::APPROVED, json!(false));
    state
}

/// A built pipeline graph, reusable across runs.
pub struct Pipeline {
    graph: StateGraph,
}

impl Pipeline {
    pub fn new(options: PipelineOptions, collaborators: Collaborators) -> Result<Self> {
        Ok(Self {
            graph: build_graph(options, collaborators)?,
        })
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn run(&self, raw: &RawInput) -> Result<PipelineRun> {
        self.run_with_meta(raw, RunMeta::new())
    }

    pub fn run_with_meta(&self, raw: &RawInput, meta: RunMeta) -> Result<PipelineRun> {
        info!(run_id = %meta.run_id, "Pipeline run started");

        let result = self.graph.invoke(seed_state(raw, &meta))?;
        let path: Vec<String> = result.path().into_iter().map(String::from).collect();
        let state = result.state;

        let (outcome, documents) = if state.flag(fields::APPROVED) {
            (RunOutcome::Approved, state.get_as::<Documents>(fields::DOCUMENTS)?)
        } else {
            let critique = state.get_str(fields::CRITIQUE).unwrap_or_default().to_string();
            let rejections = state.counter(fields::REVISIONS);
            let revisions = rejections.saturating_sub(1);
            warn!(run_id = %meta.run_id, rejections, revisions, critique = %critique, "Revision cap reached without approval");
            (RunOutcome::Unresolved { critique, revisions }, None)
        };

        info!(
            run_id = %meta.run_id,
            steps = path.len(),
            approved = outcome == RunOutcome::Approved,
            elapsed_ms = result.total_elapsed_ms,
            "Pipeline run finished"
        );

        Ok(PipelineRun {
            meta,
            outcome,
            documents,
            state,
            path,
        })
    }
}

/// Build the graph and run it once.
pub fn run_pipeline(
    raw: &RawInput,
    options: PipelineOptions,
    collaborators: Collaborators,
) -> Result<PipelineRun> {
    Pipeline::new(options, collaborators)?.run(raw)
}

/// Wire the pipeline agents into a graph.
pub fn build_graph(options: PipelineOptions, collaborators: Collaborators) -> Result<StateGraph> {
    let mut graph = StateGraph::new().with_max_steps(options.max_steps);

    let parser = ParserAgent::new();
    graph.add_node(
        Node::new(nodes::PARSER, move |state: &State| {
            let raw: RawInput = state.require(fields::RAW_INPUT)?;
            let product = parser.parse(&raw)?;
            Ok(NodeOutput::Update(
                StateDelta::new().with_value(fields::PRODUCT, &product)?,
            ))
        })
        .writes([fields::PRODUCT]),
    )?;

    if let Some(reason) = collaborators.refiner.reason() {
        info!(reason, "Answer refinement unavailable");
    }
    let qa = QaGenerator::new(options.target_qa_items.max(options.min_qa_items))
        .with_refiner(collaborators.refiner);
    graph.add_node(
        Node::new(nodes::QA, move |state: &State| {
            let product: Product = state.require(fields::PRODUCT)?;
            let items = qa.generate(&product);
            Ok(NodeOutput::Update(
                StateDelta::new().with_value(fields::QA_PAIRS, &items)?,
            ))
        })
        .writes([fields::QA_PAIRS]),
    )?;

    let content = ContentBlockAgent::new();
    graph.add_node(
        Node::new(nodes::CONTENT, move |state: &State| {
            let product: Product = state.require(fields::PRODUCT)?;
            Ok(NodeOutput::Update(
                StateDelta::new().with_value(fields::BLOCKS, &content.build(&product))?,
            ))
        })
        .writes([fields::BLOCKS]),
    )?;

    let critique = CritiqueAgent::new(options.min_qa_items, options.required_blocks.clone());
    graph.add_node(
        Node::new(nodes::CRITIQUE, move |state: &State| {
            let verdict = critique.review(state);
            let mut delta = StateDelta::new()
                .with(fields::APPROVED, json!(verdict.approved))
                .with(fields::CRITIQUE, json!(verdict.summary()));
            if !verdict.approved {
                delta.set(fields::REVISIONS, json!(state.counter(fields::REVISIONS) + 1));
            }
            Ok(NodeOutput::Update(delta))
        })
        .writes([fields::APPROVED, fields::CRITIQUE, fields::REVISIONS]),
    )?;

    let comparison = ComparisonAgent::new();
    graph.add_node(
        Node::new(nodes::COMPARISON, move |state: &State| {
            let product: Product = state.require(fields::PRODUCT)?;
            Ok(NodeOutput::Update(
                StateDelta::new().with_value(fields::COMPARISON, &comparison.compare(&product))?,
            ))
        })
        .writes([fields::COMPARISON]),
    )?;

    let retrieval = match collaborators.retriever {
        Capability::Available(retriever) => Some(RetrievalAgent::new(
            retriever,
            options.probe_query.clone(),
            options.top_k,
        )),
        Capability::Unavailable { reason } => {
            info!(reason = %reason, "Retrieval unavailable, skipping index node");
            None
        }
    };
    let indexed = retrieval.is_some();
    if let Some(agent) = retrieval {
        graph.add_node(
            Node::new(nodes::INDEX, move |state: &State| {
                let qa_items: Vec<QaItem> = state.get_as(fields::QA_PAIRS)?.unwrap_or_default();
                let blocks: Blocks = state.get_as(fields::BLOCKS)?.unwrap_or_default();
                let report = agent.index_and_probe(&qa_items, &blocks);
                Ok(NodeOutput::Update(
                    StateDelta::new().with_value(fields::RETRIEVAL, &report)?,
                ))
            })
            .writes([fields::RETRIEVAL]),
        )?;
    }

    let assembler = AssemblerAgent::new(options.templates.clone());
    graph.add_node(
        Node::new(nodes::ASSEMBLER, move |state: &State| {
            let product: Product = state.require(fields::PRODUCT)?;
            let blocks: Blocks = state.get_as(fields::BLOCKS)?.unwrap_or_default();
            let qa_items: Vec<QaItem> = state.get_as(fields::QA_PAIRS)?.unwrap_or_default();
            let comparison: Comparison = state.require(fields::COMPARISON)?;
            let meta = RunMeta {
                run_id: state.require::<RunId>(fields::RUN_ID)?,
                timestamp: state.require::<DateTime<Utc>>(fields::TIMESTAMP)?,
            };
            let documents = assembler.assemble(&product, &blocks, &qa_items, &comparison, &meta);
            Ok(NodeOutput::Update(
                StateDelta::new().with_value(fields::DOCUMENTS, &documents)?,
            ))
        })
        .writes([fields::DOCUMENTS]),
    )?;

    graph.add_edge(nodes::PARSER, nodes::QA)?;
    graph.add_edge(nodes::QA, nodes::CONTENT)?;
    graph.add_edge(nodes::CONTENT, nodes::CRITIQUE)?;
    graph.add_conditional_edge(nodes::CRITIQUE, route_after_critique(options.max_revisions))?;
    if indexed {
        graph.add_edge(nodes::COMPARISON, nodes::INDEX)?;
        graph.add_edge(nodes::INDEX, nodes::ASSEMBLER)?;
    } else {
        graph.add_edge(nodes::COMPARISON, nodes::ASSEMBLER)?;
    }
    graph.set_start(nodes::PARSER);

    graph.validate()?;
    Ok(graph)
}
