//! End-to-end executor scenarios: statements registered against the
//! scripted driver, run through the pool, the binder, and the
//! second-level cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlbind_cache::CacheBuilder;
use sqlbind_executor::{
    AffectedKind, Executor, ExecutorError, MapperMethod, ReturnShape, RowBounds,
};
use sqlbind_mapping::{
    CommandKind, InterfaceGraph, SqlNode, SqlSource, StatementDefinition, StatementRegistry,
    StatementResolver,
};
use sqlbind_pool::{Pool, PoolConfig};
use sqlbind_testing::{MockFactory, row};
use sqlbind_types::{CodecRegistry, Value};

fn static_statement(id: &str, kind: CommandKind, sql: &str) -> StatementDefinition {
    let source = SqlSource::new(SqlNode::Static(sql.to_string())).expect("static source");
    StatementDefinition::new(id, kind, source)
}

fn search_statement() -> StatementDefinition {
    let source = SqlSource::new(SqlNode::Mixed(vec![
        SqlNode::Static("SELECT id, name FROM users".to_string()),
        SqlNode::Where(Box::new(SqlNode::If {
            test: "name".to_string(),
            contents: Box::new(SqlNode::Static("AND name = #{name}".to_string())),
        })),
    ]))
    .expect("dynamic source");
    StatementDefinition::new("app.UserMapper.search", CommandKind::Select, source)
}

fn registry() -> StatementRegistry {
    let mut registry = StatementRegistry::new();
    let statements = [
        static_statement(
            "app.UserMapper.findById",
            CommandKind::Select,
            "SELECT id, name FROM users WHERE id = #{id}",
        )
        .cache("users"),
        static_statement(
            "app.UserMapper.findAll",
            CommandKind::Select,
            "SELECT id, name FROM users",
        )
        .cache("users"),
        static_statement(
            "app.UserMapper.countMissing",
            CommandKind::Select,
            "SELECT total FROM empty_table",
        ),
        static_statement(
            "app.UserMapper.deleteAll",
            CommandKind::Delete,
            "DELETE FROM users",
        )
        .cache("users"),
        search_statement(),
    ];
    for statement in statements {
        registry.register(statement).expect("register");
    }
    registry
}

fn setup() -> (Executor, Arc<MockFactory>) {
    let factory = Arc::new(MockFactory::new());
    // Longest prefix first; lookup picks the first match.
    factory.script_rows(
        "SELECT id, name FROM users WHERE id",
        vec![row(
            &["id", "name"],
            vec![Value::Int(1), Value::Text("alice".to_string())],
        )],
    );
    factory.script_rows(
        "SELECT id, name FROM users",
        vec![
            row(
                &["id", "name"],
                vec![Value::Int(1), Value::Text("alice".to_string())],
            ),
            row(
                &["id", "name"],
                vec![Value::Int(2), Value::Text("bob".to_string())],
            ),
        ],
    );
    factory.script_affected("DELETE FROM users", 3);

    let pool =
        Pool::new(Arc::clone(&factory) as _, PoolConfig::default()).expect("pool construction");
    let mut executor = Executor::new(pool, registry(), CodecRegistry::new()).environment_id("dev");
    executor.register_cache(CacheBuilder::new("users").build::<Vec<sqlbind_types::Row>>());
    (executor, factory)
}

fn args(pairs: &[(&str, Value)]) -> Value {
    Value::Map(
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[tokio::test]
async fn test_repeated_select_is_served_from_cache() {
    let (executor, factory) = setup();
    let id = "app.UserMapper.findById";

    let first = executor
        .query(id, args(&[("id", Value::Int(1))]))
        .await
        .expect("first query");
    let second = executor
        .query(id, args(&[("id", Value::Int(1))]))
        .await
        .expect("second query");

    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(factory.queries(), 1);
}

#[tokio::test]
async fn test_distinct_arguments_are_distinct_cache_entries() {
    let (executor, factory) = setup();
    let id = "app.UserMapper.findById";

    executor
        .query(id, args(&[("id", Value::Int(1))]))
        .await
        .expect("id 1");
    executor
        .query(id, args(&[("id", Value::Int(2))]))
        .await
        .expect("id 2");

    assert_eq!(factory.queries(), 2);
}

#[tokio::test]
async fn test_mutation_flushes_the_statement_cache() {
    let (executor, factory) = setup();

    executor
        .query("app.UserMapper.findAll", Value::Null)
        .await
        .expect("warm");
    executor
        .query("app.UserMapper.findAll", Value::Null)
        .await
        .expect("cached");
    assert_eq!(factory.queries(), 1);

    let affected = executor
        .update("app.UserMapper.deleteAll", Value::Null)
        .await
        .expect("delete");
    assert_eq!(affected, 3);
    assert_eq!(factory.executes(), 1);

    executor
        .query("app.UserMapper.findAll", Value::Null)
        .await
        .expect("reloaded");
    assert_eq!(factory.queries(), 2);
}

#[tokio::test]
async fn test_row_bounds_page_the_result() {
    let (executor, _factory) = setup();

    let page = executor
        .query_bounded("app.UserMapper.findAll", Value::Null, RowBounds::new(1, 1))
        .await
        .expect("page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].get_by_name("name"), Some(&Value::Text("bob".to_string())));
}

#[tokio::test]
async fn test_dynamic_where_clause_binds_per_call() {
    let (executor, factory) = setup();
    let id = "app.UserMapper.search";

    let filtered = executor
        .query(id, args(&[("name", Value::Text("alice".to_string()))]))
        .await
        .expect("filtered");
    assert_eq!(filtered.len(), 2);

    let unfiltered = executor.query(id, Value::Null).await.expect("unfiltered");
    assert_eq!(unfiltered.len(), 2);
    assert_eq!(factory.queries(), 2);
}

#[tokio::test]
async fn test_cursor_path_never_touches_the_cache() {
    let (executor, factory) = setup();
    let id = "app.UserMapper.findAll";

    for _ in 0..2 {
        let mut names = Vec::new();
        let count = executor
            .query_with_handler(id, Value::Null, RowBounds::default(), &mut |row| {
                if let Some(Value::Text(name)) = row.get_by_name("name") {
                    names.push(name.clone());
                }
            })
            .await
            .expect("cursor");
        assert_eq!(count, 2);
        assert_eq!(names, ["alice", "bob"]);
    }
    assert_eq!(factory.queries(), 2);
}

#[tokio::test]
async fn test_mapper_one_shape_returns_a_row_map() {
    let (executor, _factory) = setup();
    let resolver = StatementResolver::new(InterfaceGraph::new());
    let method = MapperMethod::new(
        "app.UserMapper",
        "findById",
        ReturnShape::One { primitive: false },
    );

    let value = method
        .execute(&executor, &resolver, args(&[("id", Value::Int(1))]))
        .await
        .expect("execute");
    let Value::Map(entries) = value else {
        panic!("expected a row map, got {value}");
    };
    assert_eq!(entries.get("name"), Some(&Value::Text("alice".to_string())));
}

#[tokio::test]
async fn test_mapper_primitive_shape_rejects_an_empty_result() {
    let (executor, _factory) = setup();
    let resolver = StatementResolver::new(InterfaceGraph::new());
    let method = MapperMethod::new(
        "app.UserMapper",
        "countMissing",
        ReturnShape::One { primitive: true },
    );

    let result = method.execute(&executor, &resolver, Value::Null).await;
    assert!(matches!(
        result,
        Err(ExecutorError::ContractViolation { .. })
    ));
}

#[tokio::test]
async fn test_mapper_one_shape_rejects_multiple_rows() {
    let (executor, _factory) = setup();
    let resolver = StatementResolver::new(InterfaceGraph::new());
    let method = MapperMethod::new(
        "app.UserMapper",
        "findAll",
        ReturnShape::One { primitive: false },
    );

    let result = method.execute(&executor, &resolver, Value::Null).await;
    assert!(matches!(
        result,
        Err(ExecutorError::TooManyResults {
            expected: 1,
            actual: 2,
        })
    ));
}

#[tokio::test]
async fn test_mapper_map_by_key_shape() {
    let (executor, _factory) = setup();
    let resolver = StatementResolver::new(InterfaceGraph::new());
    let method = MapperMethod::new(
        "app.UserMapper",
        "findAll",
        ReturnShape::MapByKey("id".to_string()),
    );

    let value = method
        .execute(&executor, &resolver, Value::Null)
        .await
        .expect("execute");
    let Value::Map(entries) = value else {
        panic!("expected a keyed map, got {value}");
    };
    assert_eq!(entries.len(), 2);
    assert!(entries.contains_key("1"));
    assert!(entries.contains_key("2"));
}

#[tokio::test]
async fn test_mapper_affected_shapes() {
    let (executor, _factory) = setup();
    let resolver = StatementResolver::new(InterfaceGraph::new());

    let as_int = MapperMethod::new(
        "app.UserMapper",
        "deleteAll",
        ReturnShape::Affected(AffectedKind::Int),
    );
    assert_eq!(
        as_int
            .execute(&executor, &resolver, Value::Null)
            .await
            .expect("int"),
        Value::Int(3)
    );

    let as_bool = MapperMethod::new(
        "app.UserMapper",
        "deleteAll",
        ReturnShape::Affected(AffectedKind::Bool),
    );
    assert_eq!(
        as_bool
            .execute(&executor, &resolver, Value::Null)
            .await
            .expect("bool"),
        Value::Bool(true)
    );
}

#[tokio::test]
async fn test_mapper_resolves_inherited_methods() {
    let (executor, _factory) = setup();
    let mut graph = InterfaceGraph::new();
    graph.register("app.AdminMapper", ["app.UserMapper"]);
    let resolver = StatementResolver::new(graph);

    // The statement lives under UserMapper's id; the call arrives through
    // the extending AdminMapper interface.
    let method = MapperMethod::new("app.AdminMapper", "findById", ReturnShape::Many)
        .declared_in("app.UserMapper");
    let value = method
        .execute(&executor, &resolver, args(&[("id", Value::Int(1))]))
        .await
        .expect("execute");
    assert!(matches!(value, Value::Array(rows) if rows.len() == 1));
}

#[tokio::test]
async fn test_mapper_unresolvable_method_fails() {
    let (executor, _factory) = setup();
    let resolver = StatementResolver::new(InterfaceGraph::new());
    let method = MapperMethod::new("app.AdminMapper", "findById", ReturnShape::Many);

    let result = method.execute(&executor, &resolver, Value::Null).await;
    assert!(matches!(result, Err(ExecutorError::Binding(_))));
}

#[tokio::test]
async fn test_mapper_cursor_shape_requires_a_handler() {
    let (executor, _factory) = setup();
    let resolver = StatementResolver::new(InterfaceGraph::new());
    let method = MapperMethod::new("app.UserMapper", "findAll", ReturnShape::Cursor);

    let result = method.execute(&executor, &resolver, Value::Null).await;
    assert!(matches!(
        result,
        Err(ExecutorError::ContractViolation { .. })
    ));

    let mut seen = 0usize;
    let count = method
        .execute_with_handler(
            &executor,
            &resolver,
            Value::Null,
            RowBounds::default(),
            &mut |_row| seen += 1,
        )
        .await
        .expect("handler path");
    assert_eq!(count, 2);
    assert_eq!(seen, 2);
}
