use chrono::{DateTime, TimeZone, Utc};
use mailq::prelude::*;
use mailq::{compile, parse};
use pretty_assertions::assert_eq;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

fn word(text: &str) -> QueryExpression {
    QueryExpression::generic(Token::new(text))
}

#[test]
fn test_fully_compatible_query_condenses_to_one_match() {
    let tree = parse("from:\"ben@x.com\" subject:hello").unwrap();
    assert_eq!(
        tree,
        QueryExpression::and(
            QueryExpression::sender(Token::quoted("ben@x.com")),
            QueryExpression::subject(Token::new("hello")),
        )
    );
    assert!(tree.is_match_compatible());

    let condensed = SearchCompiler::new("Thread")
        .condense("from:\"ben@x.com\" subject:hello")
        .unwrap();
    assert!(condensed.is_match());
}

#[test]
fn test_flag_is_kept_beside_match() {
    let compiler = SearchCompiler::new("Thread");
    assert_eq!(
        compiler.parse("is:unread from:ben").unwrap(),
        QueryExpression::and(
            QueryExpression::unread(true),
            QueryExpression::sender(Token::new("ben")),
        )
    );
    assert_eq!(
        compiler.condense("is:unread from:ben").unwrap(),
        QueryExpression::and(
            QueryExpression::unread(true),
            QueryExpression::match_query("(from_ : \"ben\"*)"),
        )
    );
}

#[test]
fn test_or_binds_tighter_than_implicit_and() {
    let tree = parse("a OR b c").unwrap();
    assert_eq!(
        tree,
        QueryExpression::and(QueryExpression::or(word("a"), word("b")), word("c"))
    );
    assert_ne!(
        tree,
        QueryExpression::or(word("a"), QueryExpression::and(word("b"), word("c")))
    );
}

#[test]
fn test_group_with_flag() {
    assert_eq!(
        parse("(a OR b) is:starred").unwrap(),
        QueryExpression::and(
            QueryExpression::or(word("a"), word("b")),
            QueryExpression::starred(true),
        )
    );
}

#[test]
fn test_has_attachment_uses_serialized_data() {
    let sql = compile("has:attachment", "Thread").unwrap();
    assert!(sql.contains("Thread.data"));
    assert!(!sql.contains("Search"));
}

#[test]
fn test_recipient_compiles_to_match_subquery() {
    assert_eq!(
        compile("to:eve", "Message").unwrap(),
        "(Message.id IN (SELECT content_id FROM MessageSearch WHERE MessageSearch MATCH '(to_ : \"eve\"*)'))"
    );
}

#[test]
fn test_equality_ignores_whitespace_and_keyword_case() {
    let pairs = [
        ("a OR b c", "  a   or  b\tc "),
        ("from:ben is:unread", "FROM : ben Is:UnRead"),
        ("a AND b", "a and b"),
        ("a NOT b", "a not b"),
        ("(a OR b)", "( a OR b )"),
    ];
    for (left, right) in pairs {
        assert_eq!(parse(left).unwrap(), parse(right).unwrap(), "{left} vs {right}");
    }
}

#[test]
fn test_negative_pairs_parse_differently() {
    let pairs = [
        ("a b", "b a"),
        ("from:ben", "to:ben"),
        ("\"ben\"", "ben"),
        ("Ben", "ben"),
        ("before:x", "after:x"),
        ("a OR b c", "a OR (b c)"),
        ("a NOT b", "b NOT a"),
    ];
    for (left, right) in pairs {
        assert_ne!(parse(left).unwrap(), parse(right).unwrap(), "{left} vs {right}");
    }
}

#[test]
fn test_overlong_query_is_a_parse_error() {
    let query = vec!["is:unread word"; 2_500].join(" ");
    let err = compile(&query, "Thread").unwrap_err();
    assert!(matches!(err, SearchError::Parse { .. }), "{err}");
    assert!(err.to_string().contains("query too long"), "{err}");

    let err = compile(&vec!["word"; 50_000].join(" OR "), "Thread").unwrap_err();
    assert!(matches!(err, SearchError::Parse { .. }), "{err}");
}

#[test]
fn test_longest_allowed_query_compiles() {
    let query = vec!["is:unread word"; 256].join(" ");
    let sql = compile(&query, "Thread").unwrap();
    assert_eq!(sql.matches("(Thread.unread = 1)").count(), 256);
    assert_eq!(sql.matches("MATCH").count(), 256);
}

#[test]
fn test_empty_queries_are_rejected() {
    for query in ["", "   ", "\t\n"] {
        let err = parse(query).unwrap_err();
        assert!(matches!(err, SearchError::Empty), "{query:?}");
        assert_eq!(err.to_string(), "Cannot parse empty query");
    }
}

#[test]
fn test_unterminated_quote_names_the_string() {
    let err = parse("from:\"ben").unwrap_err();
    match &err {
        SearchError::Lex { position, fragment } => {
            assert_eq!(*position, 5);
            assert_eq!(fragment, "\"ben");
        }
        other => panic!("expected lex error, got {other:?}"),
    }
    assert!(err.to_string().contains("\"ben"));
}

#[test]
fn test_unknown_qualifier_both_ways() {
    let strict = SearchCompiler::new("Thread");
    let err = strict.parse("is:foo").unwrap_err();
    assert!(err.to_string().contains("foo"));

    let lenient = SearchCompiler::new("Thread").with_options(ParseOptions {
        unknown_qualifier: UnknownQualifier::Literal,
        ..ParseOptions::default()
    });
    assert_eq!(
        lenient.parse("is:foo").unwrap(),
        QueryExpression::generic(Token::new("is:foo"))
    );
}

#[test]
fn test_mixed_query_end_to_end() {
    let compiler = SearchCompiler::new("Thread");
    let yesterday = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap().timestamp();
    assert_eq!(
        compiler
            .compile_at("(from:ben OR to:ben) is:unread before:yesterday", now())
            .unwrap(),
        format!(
            "((Thread.id IN (SELECT content_id FROM ThreadSearch WHERE ThreadSearch MATCH '((from_ : \"ben\"*) OR (to_ : \"ben\"*))')) AND ((Thread.unread = 1) AND (Thread.lastMessageReceivedTimestamp < {})))",
            yesterday
        )
    );
}

#[test]
fn test_negation_end_to_end() {
    let compiler = SearchCompiler::new("Thread");
    assert_eq!(
        compiler.compile_at("in:inbox NOT is:starred", now()).unwrap(),
        "((Thread.id IN (SELECT content_id FROM ThreadSearch WHERE ThreadSearch MATCH '(categories : \"inbox*\")')) AND NOT (Thread.starred = 1))"
    );
}

#[test]
fn test_sqlite_dialect_end_to_end() {
    let compiler = SearchCompiler::new("Thread").with_dialect(Dialect::Sqlite);
    assert_eq!(
        compiler.compile_at("is:unread", now()).unwrap(),
        "(`Thread`.`unread` = 1)"
    );
}

#[test]
fn test_explanation_serializes() {
    let explanation = SearchCompiler::new("Thread")
        .explain("is:starred", now())
        .unwrap();
    let json = serde_json::to_value(&explanation).unwrap();
    assert_eq!(json["entity"], "Thread");
    assert_eq!(json["dialect"], "plain");
    assert_eq!(json["sql"], "(Thread.starred = 1)");
}
