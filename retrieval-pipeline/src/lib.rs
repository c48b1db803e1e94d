//! The six-level retrieval resolver (spec §4.7) and its four underlying
//! retriever strategies (spec §4.8). Grounded in the teacher's
//! `retrieval-pipeline` crate boundary (query builders and execution live in
//! `common`, this crate is pure retrieval logic over them).

pub mod resolver;
pub mod retrievers;

pub use resolver::{
    ArtifactBundle, ChunkSummary, EntitySummary, RelationSummary, ResolutionLevel, Resolver,
    ResolverConfig, ResolverResult, ResolveRequest,
};
pub use retrievers::{
    ExactMatchRetriever, FullTextRetriever, GraphRetriever, HybridRetriever, Retriever,
    RetrievedDoc, VectorRetriever,
};
