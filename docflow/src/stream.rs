//! Streaming document processing.
//!
//! An alternate execution mode where documents flow individually through a
//! fixed transform chain as the source yields them, instead of moving
//! batch-by-batch through pipeline stages. Failures are isolated per
//! document: a transform error drops that document and the stream
//! continues.

use crate::schema::{Document, RunContext};
use futures::{Stream, StreamExt};
use std::sync::Arc;

/// A per-document transformation.
pub trait DocumentTransform: Send + Sync {
    /// Transforms one document.
    ///
    /// An error drops the document from the stream; it never stops the
    /// stream itself.
    fn apply(&self, document: Document, context: &RunContext) -> anyhow::Result<Document>;
}

struct FnTransform<F> {
    func: F,
}

impl<F> DocumentTransform for FnTransform<F>
where
    F: Fn(Document, &RunContext) -> anyhow::Result<Document> + Send + Sync,
{
    fn apply(&self, document: Document, context: &RunContext) -> anyhow::Result<Document> {
        (self.func)(document, context)
    }
}

/// Wraps a plain function as a [`DocumentTransform`].
pub fn transform_fn<F>(func: F) -> Arc<dyn DocumentTransform>
where
    F: Fn(Document, &RunContext) -> anyhow::Result<Document> + Send + Sync + 'static,
{
    Arc::new(FnTransform { func })
}

/// A pipeline that processes documents one by one as the source yields
/// them.
///
/// The produced stream is single-pass and finite iff the source is finite.
#[derive(Clone, Default)]
pub struct StreamPipeline {
    transforms: Vec<Arc<dyn DocumentTransform>>,
}

impl StreamPipeline {
    /// Creates a stream pipeline over an ordered transform chain.
    #[must_use]
    pub fn new(transforms: Vec<Arc<dyn DocumentTransform>>) -> Self {
        Self { transforms }
    }

    /// Appends a transform to the chain.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn DocumentTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Number of transforms in the chain.
    #[must_use]
    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    /// Yields transformed documents as they become available.
    ///
    /// Transforms are applied in order per document. On a dry run every
    /// document passes through unchanged.
    pub fn run<'a, S>(
        &'a self,
        source: S,
        context: &'a RunContext,
    ) -> impl Stream<Item = Document> + 'a
    where
        S: Stream<Item = Document> + 'a,
    {
        source.filter_map(move |document| async move {
            if context.is_dry_run() {
                return Some(document);
            }

            let id = document.id;
            let mut current = document;
            for transform in &self.transforms {
                match transform.apply(current, context) {
                    Ok(next) => current = next,
                    Err(error) => {
                        tracing::error!(
                            document_id = %id,
                            error = %error,
                            "Dropping document after transform failure"
                        );
                        return None;
                    }
                }
            }
            Some(current)
        })
    }
}

impl std::fmt::Debug for StreamPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPipeline")
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;

    fn docs(contents: &[&str]) -> Vec<Document> {
        contents.iter().map(|c| Document::text(*c)).collect()
    }

    fn uppercase() -> Arc<dyn DocumentTransform> {
        transform_fn(|mut doc, _ctx| {
            doc.content = doc.content.to_uppercase();
            Ok(doc)
        })
    }

    fn reject_containing(needle: &'static str) -> Arc<dyn DocumentTransform> {
        transform_fn(move |doc, _ctx| {
            if doc.content.contains(needle) {
                anyhow::bail!("content contains '{needle}'");
            }
            Ok(doc)
        })
    }

    #[tokio::test]
    async fn test_transforms_apply_in_order() {
        let pipeline = StreamPipeline::default()
            .with_transform(uppercase())
            .with_transform(transform_fn(|mut doc, _ctx| {
                doc.content.push('!');
                Ok(doc)
            }));
        let context = RunContext::new("task");

        let out: Vec<_> = pipeline
            .run(stream::iter(docs(&["a", "b"])), &context)
            .collect()
            .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "A!");
        assert_eq!(out[1].content, "B!");
    }

    #[tokio::test]
    async fn test_failed_document_is_dropped_stream_continues() {
        let pipeline = StreamPipeline::default()
            .with_transform(reject_containing("3"))
            .with_transform(uppercase());
        let context = RunContext::new("task");

        let input = docs(&["doc 1", "doc 2", "doc 3", "doc 4", "doc 5"]);
        let out: Vec<_> = pipeline.run(stream::iter(input), &context).collect().await;

        assert_eq!(out.len(), 4);
        let contents: Vec<_> = out.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["DOC 1", "DOC 2", "DOC 4", "DOC 5"]);
    }

    #[tokio::test]
    async fn test_dry_run_passes_documents_through() {
        let pipeline = StreamPipeline::default().with_transform(reject_containing("doc"));
        let context = RunContext::new("task").with_dry_run(true);

        let out: Vec<_> = pipeline
            .run(stream::iter(docs(&["doc 1", "doc 2"])), &context)
            .collect()
            .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "doc 1");
    }

    #[tokio::test]
    async fn test_empty_source_yields_empty_stream() {
        let pipeline = StreamPipeline::default().with_transform(uppercase());
        let context = RunContext::new("task");

        let out: Vec<_> = pipeline
            .run(stream::iter(Vec::<Document>::new()), &context)
            .collect()
            .await;

        assert!(out.is_empty());
    }
}
