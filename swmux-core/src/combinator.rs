//! Ordered aggregation of script fragments for a single service worker scope.
//!
//! The ServiceWorker API allows exactly one worker per scope, so independent
//! producers cannot each register their own script. Instead they append a
//! [`ContentProducer`] to the scope's [`Combinator`], and the combinator
//! renders every fragment into one script body at serve time, in registration
//! order.

use std::io;

use parking_lot::RwLock;

/// A producer of one script fragment.
///
/// Producers write into the supplied sink rather than returning a string, so
/// large or conditional fragments can stream without intermediate buffers.
pub trait ContentProducer: Send + Sync {
    fn produce(&self, sink: &mut dyn io::Write) -> io::Result<()>;
}

impl<F> ContentProducer for F
where
    F: Fn(&mut dyn io::Write) -> io::Result<()> + Send + Sync,
{
    fn produce(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        self(sink)
    }
}

/// Adapter for producers whose fragment is a fixed string.
#[derive(Debug, Clone)]
pub struct StaticContent(String);

impl StaticContent {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }
}

impl ContentProducer for StaticContent {
    fn produce(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        sink.write_all(self.0.as_bytes())
    }
}

/// Aggregates content producers for one service worker.
///
/// A combinator is created by the manager when a scope is first requested and
/// shared behind `Arc`, so plugin code can keep appending producers to the
/// same instance for as long as setup runs.
pub struct Combinator {
    url: String,
    writers: RwLock<Vec<Box<dyn ContentProducer>>>,
}

impl Combinator {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            writers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a producer to write a portion of the service worker.
    ///
    /// Producers render in registration order; identical producers are not
    /// de-duplicated.
    pub fn add_content(&self, producer: impl ContentProducer + 'static) {
        self.writers.write().push(Box::new(producer));
    }

    /// Renders every registered producer into `sink`.
    ///
    /// A `;` statement separator is emitted ahead of each fragment so that
    /// producers that forget a trailing terminator cannot corrupt the
    /// fragment that follows them.
    pub fn render(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        let writers = self.writers.read();
        for producer in writers.iter() {
            sink.write_all(b";")?;
            producer.produce(sink)?;
        }
        Ok(())
    }

    pub fn render_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.render(&mut out)?;
        Ok(out)
    }

    /// True once at least one producer has been registered. Scopes without
    /// content are skipped by the registrar so the browser never registers an
    /// empty worker.
    pub fn has_content(&self) -> bool {
        !self.writers.read().is_empty()
    }

    /// The externally reachable URL of the rendered worker, fixed at
    /// construction.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Combinator")
            .field("url", &self.url)
            .field("writers", &self.writers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fragments_in_registration_order() {
        let combinator = Combinator::new("/sw.js");
        combinator.add_content(StaticContent::new("A"));
        combinator.add_content(StaticContent::new("B"));
        combinator.add_content(StaticContent::new("C"));

        let out = combinator.render_to_vec().unwrap();
        assert_eq!(out, b";A;B;C");
    }

    #[test]
    fn emits_separator_before_every_fragment() {
        let combinator = Combinator::new("/sw.js");
        combinator.add_content(StaticContent::new("console.log(1)"));

        let out = combinator.render_to_vec().unwrap();
        assert_eq!(out, b";console.log(1)");
    }

    #[test]
    fn identical_producers_are_not_deduplicated() {
        let combinator = Combinator::new("/sw.js");
        combinator.add_content(StaticContent::new("X"));
        combinator.add_content(StaticContent::new("X"));

        assert_eq!(combinator.render_to_vec().unwrap(), b";X;X");
    }

    #[test]
    fn has_content_is_monotonic() {
        let combinator = Combinator::new("/sw.js");
        assert!(!combinator.has_content());

        combinator.add_content(StaticContent::new("A"));
        assert!(combinator.has_content());

        combinator.add_content(StaticContent::new("B"));
        assert!(combinator.has_content());
    }

    #[test]
    fn closure_producers_stream_into_the_sink() {
        let combinator = Combinator::new("/sw.js");
        combinator.add_content(|sink: &mut dyn io::Write| {
            sink.write_all(b"part1,")?;
            sink.write_all(b"part2")
        });

        assert_eq!(combinator.render_to_vec().unwrap(), b";part1,part2");
    }

    #[test]
    fn url_is_fixed_at_construction() {
        let combinator = Combinator::new("/dispatch?sw=1");
        assert_eq!(combinator.url(), "/dispatch?sw=1");
    }
}
