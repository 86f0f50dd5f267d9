//! End-to-end tests of nested query execution.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use triplenest_core::{
    CancellationToken, Error, Event, ExecutionConfig, ExecutionError, FieldMapping, IterCursor,
    JsonCollector, JsonWriter, Level, MemoryExecutor, NestedQuery, PivotOrder, PropertyPivot,
    QueryExecutor, QueryTemplate, RecordingCollector, ResultCollector, ResultCursor,
};

const ARTICLES: &str = "SELECT ?Article ?p ?o {?Article a <$Type>. ?Article ?p ?o} ORDER BY ?Article";
const AGENTS: &str = "SELECT ?Agent ?p ?o {<$Article> <urn:creator> ?Agent. ?Agent ?p ?o} ORDER BY ?Agent";

fn articles_chain() -> NestedQuery {
    NestedQuery::builder()
        .level(Level::new(
            "articles",
            QueryTemplate::parse(ARTICLES).unwrap(),
            "Article",
        ))
        .level(Level::new(
            "agents",
            QueryTemplate::parse(AGENTS).unwrap(),
            "Agent",
        ))
        .build()
        .unwrap()
}

fn agents_query(article: &str) -> String {
    AGENTS.replace("$Article", article)
}

fn articles_executor() -> MemoryExecutor {
    MemoryExecutor::new()
        .with_rows(
            &ARTICLES.replace("$Type", "urn:Article"),
            ["Article", "p", "o"],
            [
                ["A1", "title", "First"],
                ["A2", "title", "Second"],
                ["A2", "year", "2010"],
            ],
        )
        .with_rows(
            &agents_query("A1"),
            ["Agent", "p", "o"],
            [["Ag1", "name", "Ada"]],
        )
        .with_rows(
            &agents_query("A2"),
            ["Agent", "p", "o"],
            [
                ["Ag1", "name", "Ada"],
                ["Ag2", "name", "Bob"],
                ["Ag2", "mbox", "bob@example.org"],
                ["Ag2", "mbox", "bob@example.com"],
            ],
        )
}

fn run_json(
    chain: &NestedQuery,
    executor: &MemoryExecutor,
    config: &ExecutionConfig,
) -> serde_json::Value {
    let mut collector =
        JsonCollector::new(JsonWriter::new(Vec::new()), FieldMapping::new("p", "o"));
    chain
        .execute_with_config(executor, &mut collector, &["urn:Article"], config)
        .unwrap();
    let writer = collector.into_inner();
    assert!(writer.is_complete());
    serde_json::from_slice(&writer.into_inner()).unwrap()
}

#[test]
fn test_end_to_end_json() {
    let doc = run_json(&articles_chain(), &articles_executor(), &ExecutionConfig::default());
    assert_eq!(
        doc,
        json!({
            "articles": {
                "A1": {
                    "agents": {"Ag1": {"name": "Ada"}},
                    "title": "First"
                },
                "A2": {
                    "agents": {
                        "Ag1": {"name": "Ada"},
                        "Ag2": {
                            "name": "Bob",
                            "mbox": ["bob@example.org", "bob@example.com"]
                        }
                    },
                    "title": "Second",
                    "year": "2010"
                }
            }
        })
    );
}

#[test]
fn test_single_begin_end_and_balanced_levels() {
    let mut collector = RecordingCollector::new();
    articles_chain()
        .execute(&articles_executor(), &mut collector, &["urn:Article"])
        .unwrap();

    let events = collector.events();
    assert_eq!(events.first(), Some(&Event::Begin));
    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(events.iter().filter(|e| **e == Event::Begin).count(), 1);
    assert_eq!(events.iter().filter(|e| **e == Event::End).count(), 1);

    let mut open = Vec::new();
    for event in events {
        match event {
            Event::StartLevel { level, .. } => open.push(*level),
            Event::EndLevel(level) => assert_eq!(open.pop(), Some(*level)),
            _ => {}
        }
    }
    assert!(open.is_empty());
}

#[test]
fn test_one_pivot_per_group() {
    let mut collector = RecordingCollector::new();
    articles_chain()
        .execute(&articles_executor(), &mut collector, &["urn:Article"])
        .unwrap();
    // A2 spans two rows, Ag2 three; Ag1 reappears under a new parent group.
    assert_eq!(collector.pivots(), ["A1", "Ag1", "A2", "Ag1", "Ag2"]);
}

#[test]
fn test_child_arguments_bound_from_parent_row() {
    let executor = MemoryExecutor::new()
        .with_rows(
            &ARTICLES.replace("$Type", "urn:Article"),
            ["Article", "p", "o"],
            [["A1", "dc:creator", "Ag1"]],
        )
        .with_rows(&agents_query("A1"), ["Agent", "p", "o"], Vec::<[&str; 3]>::new());
    let mut collector = RecordingCollector::new();
    articles_chain()
        .execute(&executor, &mut collector, &["urn:Article"])
        .unwrap();

    let child_args: Vec<&Vec<String>> = collector
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::StartLevel { level: 1, args, .. } => Some(args),
            _ => None,
        })
        .collect();
    assert_eq!(child_args, [&vec!["A1".to_string()]]);
}

#[test]
fn test_failing_sibling_group_is_skipped() {
    let executor = MemoryExecutor::new()
        .with_rows(
            &ARTICLES.replace("$Type", "urn:Article"),
            ["Article", "p", "o"],
            [["A1", "title", "1"], ["A2", "title", "2"], ["A3", "title", "3"]],
        )
        .with_rows(&agents_query("A1"), ["Agent", "p", "o"], [["Ag1", "name", "Ada"]])
        .with_rejection(&agents_query("A2"), "malformed IRI")
        .with_rows(&agents_query("A3"), ["Agent", "p", "o"], [["Ag3", "name", "Cy"]]);

    let doc = run_json(&articles_chain(), &executor, &ExecutionConfig::default());
    assert_eq!(
        doc,
        json!({
            "articles": {
                "A1": {"agents": {"Ag1": {"name": "Ada"}}, "title": "1"},
                "A2": {"agents": {"@error": "query rejected: malformed IRI"}, "title": "2"},
                "A3": {"agents": {"Ag3": {"name": "Cy"}}, "title": "3"}
            }
        })
    );

    let err = articles_chain()
        .execute_with_config(
            &executor,
            &mut RecordingCollector::new(),
            &["urn:Article"],
            &ExecutionConfig::strict(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Execution(ref e) if e.is_rejection()));
}

#[test]
fn test_unavailable_source_aborts_even_when_lenient() {
    struct Flaky {
        inner: MemoryExecutor,
    }

    impl QueryExecutor for Flaky {
        fn execute<'a>(
            &'a self,
            query: &str,
        ) -> Result<Box<dyn ResultCursor + 'a>, ExecutionError> {
            if query.contains("<A2>") {
                return Err(ExecutionError::unavailable("connection refused"));
            }
            self.inner.execute(query)
        }
    }

    let executor = Flaky {
        inner: articles_executor(),
    };
    let err = articles_chain()
        .execute(&executor, &mut RecordingCollector::new(), &["urn:Article"])
        .unwrap_err();
    assert!(matches!(err, Error::Execution(ref e) if !e.is_rejection()));
}

#[test]
fn test_verified_order() {
    let executor = MemoryExecutor::new()
        .with_rows(
            &ARTICLES.replace("$Type", "urn:Article"),
            ["Article", "p", "o"],
            [["A1", "title", "1"], ["A2", "title", "2"], ["A1", "year", "2001"]],
        )
        .with_rows(&agents_query("A1"), ["Agent", "p", "o"], Vec::<[&str; 3]>::new())
        .with_rows(&agents_query("A2"), ["Agent", "p", "o"], Vec::<[&str; 3]>::new());

    let config = ExecutionConfig::new().with_pivot_order(PivotOrder::Verified);
    let err = articles_chain()
        .execute_with_config(&executor, &mut RecordingCollector::new(), &["urn:Article"], &config)
        .unwrap_err();
    assert!(matches!(err, Error::UnorderedPivot { level: 0, ref value } if value == "A1"));
}

/// Collector that cancels the run once it has seen `after` rows.
struct CancelAfter {
    token: CancellationToken,
    after: usize,
    seen: usize,
}

impl ResultCollector for CancelAfter {
    fn begin(&mut self) -> triplenest_core::Result<()> {
        Ok(())
    }
    fn start_level(&mut self, _: usize, _: &str, _: &[String]) -> triplenest_core::Result<()> {
        Ok(())
    }
    fn pivot(&mut self, _: &str) -> triplenest_core::Result<()> {
        Ok(())
    }
    fn start_property_pivot(&mut self, _: &str) -> triplenest_core::Result<()> {
        Ok(())
    }
    fn end_property_pivot(&mut self, _: &str) -> triplenest_core::Result<()> {
        Ok(())
    }
    fn collect(&mut self, _: &[String], _: &[String]) -> triplenest_core::Result<()> {
        self.seen += 1;
        if self.seen == self.after {
            self.token.cancel();
        }
        Ok(())
    }
    fn end_level(&mut self, _: usize) -> triplenest_core::Result<()> {
        Ok(())
    }
    fn end(&mut self) -> triplenest_core::Result<()> {
        Ok(())
    }
}

#[test]
fn test_cancellation_stops_the_run() {
    let token = CancellationToken::new();
    let mut collector = CancelAfter {
        token: token.clone(),
        after: 2,
        seen: 0,
    };
    let config = ExecutionConfig::new().with_cancellation(token);
    let err = articles_chain()
        .execute_with_config(&articles_executor(), &mut collector, &["urn:Article"], &config)
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(collector.seen, 2);
}

#[test]
fn test_property_pivot_nests_matching_rows() {
    let chain = NestedQuery::builder()
        .level(
            Level::new("articles", QueryTemplate::parse(ARTICLES).unwrap(), "Article")
                .with_property_pivot(PropertyPivot::new("p", "dc:creator", "Agent", "o")),
        )
        .level(Level::new(
            "creator",
            QueryTemplate::parse("SELECT ?p ?o {<$Agent> ?p ?o}").unwrap(),
            "p",
        ))
        .build()
        .unwrap();
    let executor = MemoryExecutor::new()
        .with_rows(
            &ARTICLES.replace("$Type", "urn:Article"),
            ["Article", "p", "o"],
            [
                ["A1", "dc:creator", "Ag1"],
                ["A1", "dc:creator", "Ag2"],
                ["A1", "title", "First"],
            ],
        )
        .with_rows("SELECT ?p ?o {<Ag1> ?p ?o}", ["p", "o"], [["name", "Ada"]])
        .with_rows("SELECT ?p ?o {<Ag2> ?p ?o}", ["p", "o"], [["name", "Bob"]])
        .with_query_log(true);

    let doc = run_json(&chain, &executor, &ExecutionConfig::default());
    assert_eq!(
        doc,
        json!({
            "articles": {
                "A1": {
                    "dc:creator": [
                        {"creator": {"name": {"name": "Ada"}}},
                        {"creator": {"name": {"name": "Bob"}}}
                    ],
                    "title": "First"
                }
            }
        })
    );
    assert_eq!(
        executor.executed(),
        [
            ARTICLES.replace("$Type", "urn:Article"),
            "SELECT ?p ?o {<Ag1> ?p ?o}".to_string(),
            "SELECT ?p ?o {<Ag2> ?p ?o}".to_string(),
        ]
    );
}

#[test]
fn test_pivot_and_property_pivot_both_nest() {
    let chain = NestedQuery::builder()
        .level(
            Level::new("articles", QueryTemplate::parse(ARTICLES).unwrap(), "Article")
                .with_property_pivot(PropertyPivot::new("p", "cites", "Article", "o")),
        )
        .level(Level::new(
            "details",
            QueryTemplate::parse("SELECT ?p ?o {<$Article> ?p ?o}").unwrap(),
            "p",
        ))
        .build()
        .unwrap();
    let executor = MemoryExecutor::new()
        .with_rows(
            &ARTICLES.replace("$Type", "urn:Article"),
            ["Article", "p", "o"],
            [
                ["A1", "cites", "A2"],
                ["A1", "title", "First"],
                ["A2", "title", "Second"],
            ],
        )
        .with_rows("SELECT ?p ?o {<A1> ?p ?o}", ["p", "o"], [["title", "First"]])
        .with_rows("SELECT ?p ?o {<A2> ?p ?o}", ["p", "o"], [["title", "Second"]])
        .with_query_log(true);

    let doc = run_json(&chain, &executor, &ExecutionConfig::default());
    assert_eq!(
        doc,
        json!({
            "articles": {
                "A1": {
                    "details": {"title": {"title": "First"}},
                    "cites": [
                        {"details": {"title": {"title": "Second"}}}
                    ],
                    "title": "First"
                },
                "A2": {
                    "details": {"title": {"title": "Second"}},
                    "title": "Second"
                }
            }
        })
    );
    assert_eq!(
        executor.executed(),
        [
            ARTICLES.replace("$Type", "urn:Article"),
            "SELECT ?p ?o {<A1> ?p ?o}".to_string(),
            "SELECT ?p ?o {<A2> ?p ?o}".to_string(),
            "SELECT ?p ?o {<A2> ?p ?o}".to_string(),
        ]
    );
}

/// Executor generating `fanout` rows per query without materializing them.
struct Synthetic {
    fanout: usize,
}

impl QueryExecutor for Synthetic {
    fn execute<'a>(&'a self, query: &str) -> Result<Box<dyn ResultCursor + 'a>, ExecutionError> {
        let prefix = match (query.find('<'), query.find('>')) {
            (Some(start), Some(end)) if start < end => query[start + 1..end].to_string(),
            _ => "root".to_string(),
        };
        let fanout = self.fanout;
        let rows = (0..fanout).map(move |i| Ok(vec![format!("{}.{}", prefix, i), "v".to_string()]));
        Ok(Box::new(IterCursor::new(
            vec!["s".to_string(), "o".to_string()],
            rows,
        )))
    }
}

#[test]
fn test_recursion_depth_is_bounded_by_chain_length() {
    let chain = NestedQuery::builder()
        .level(Level::new("l0", QueryTemplate::parse("SELECT ?s ?o {?s ?p ?o}").unwrap(), "s"))
        .level(Level::new("l1", QueryTemplate::parse("SELECT ?s ?o {<$s> ?p ?o}").unwrap(), "s"))
        .level(Level::new("l2", QueryTemplate::parse("SELECT ?s ?o {<$s> ?p ?o}").unwrap(), "s"))
        .build()
        .unwrap();

    let empty: [&str; 0] = [];
    let mut collector =
        JsonCollector::new(JsonWriter::new(std::io::sink()), FieldMapping::new("s", "o"));
    let summary = chain
        .execute(&Synthetic { fanout: 25 }, &mut collector, &empty)
        .unwrap();

    // 25 + 25^2 + 25^3 rows.
    assert_eq!(summary.rows, 16_275);
    assert!(summary.rows >= 10_000);
    assert_eq!(summary.max_depth, 3);
    assert_eq!(summary.level_invocations, 1 + 25 + 625);
    assert!(collector.writer().is_complete());
}

#[test]
fn test_chain_is_shared_across_threads() {
    let chain = Arc::new(articles_chain());
    let executor = Arc::new(articles_executor());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let chain = Arc::clone(&chain);
            let executor = Arc::clone(&executor);
            std::thread::spawn(move || {
                let mut collector = RecordingCollector::new();
                chain
                    .execute(executor.as_ref(), &mut collector, &["urn:Article"])
                    .unwrap();
                collector.lines()
            })
        })
        .collect();

    let outputs: Vec<Vec<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for output in &outputs[1..] {
        assert_eq!(output, &outputs[0]);
    }
}
