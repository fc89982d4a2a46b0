//! Query - per-query holder of alias metadata, parameters and clause parts
//!
//! A query owns the finalized SQL text (clause assembly happens elsewhere),
//! the alias metadata shared with its subqueries, and the entry points that
//! run the SQL through an injected executor and hydrate the result.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::aggregate::AggregateSpec;
use crate::alias_map::{AliasMap, TableAliasMap};
use crate::backends::{AsyncQueryExecutor, QueryExecutor, SqlDialect};
use crate::config::HydrationConfig;
use crate::error::{HydrateError, HydrateResult};
use crate::hydrator::Hydrator;
use crate::inheritance::InheritanceFilterBuilder;
use crate::record::Collection;
use crate::value::Value;

/// Query types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    #[default]
    Select,
    Delete,
    Update,
    Insert,
    Create,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Select => write!(f, "SELECT"),
            QueryType::Delete => write!(f, "DELETE"),
            QueryType::Update => write!(f, "UPDATE"),
            QueryType::Insert => write!(f, "INSERT"),
            QueryType::Create => write!(f, "CREATE"),
        }
    }
}

/// A database view standing in for the query's own SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    name: String,
    select_sql: String,
}

impl View {
    pub fn new(name: impl Into<String>, select_sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            select_sql: select_sql.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn select_sql(&self) -> &str {
        &self.select_sql
    }
}

/// Borrowed value of a named query part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPart<'a> {
    /// `select`, `from`, `set`, `join`, `where`, `groupby`, `having`, `orderby`
    Clauses(&'a [String]),
    /// `limit`, `offset`
    Bound(Option<u64>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct QueryParts {
    select: Vec<String>,
    from: Vec<String>,
    set: Vec<String>,
    join: Vec<String>,
    where_clauses: Vec<String>,
    groupby: Vec<String>,
    having: Vec<String>,
    orderby: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryParts {
    fn clauses(&self, name: &str) -> Option<&Vec<String>> {
        match name {
            "select" => Some(&self.select),
            "from" => Some(&self.from),
            "set" => Some(&self.set),
            "join" => Some(&self.join),
            "where" => Some(&self.where_clauses),
            "groupby" => Some(&self.groupby),
            "having" => Some(&self.having),
            "orderby" => Some(&self.orderby),
            _ => None,
        }
    }

    fn clauses_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        match name {
            "select" => Some(&mut self.select),
            "from" => Some(&mut self.from),
            "set" => Some(&mut self.set),
            "join" => Some(&mut self.join),
            "where" => Some(&mut self.where_clauses),
            "groupby" => Some(&mut self.groupby),
            "having" => Some(&mut self.having),
            "orderby" => Some(&mut self.orderby),
            _ => None,
        }
    }
}

/// Hydrating query
#[derive(Debug, Clone, Default)]
pub struct Query {
    alias_map: Arc<AliasMap>,
    table_aliases: Arc<TableAliasMap>,
    aggregates: AggregateSpec,
    params: Vec<Value>,
    query_type: QueryType,
    parts: QueryParts,
    sql: String,
    view: Option<View>,
    is_subquery: bool,
    config: HydrationConfig,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: HydrationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HydrationConfig {
        &self.config
    }

    pub fn alias_map(&self) -> &Arc<AliasMap> {
        &self.alias_map
    }

    pub fn set_alias_map(&mut self, alias_map: impl Into<Arc<AliasMap>>) -> &mut Self {
        self.alias_map = alias_map.into();
        self
    }

    pub fn table_aliases(&self) -> &Arc<TableAliasMap> {
        &self.table_aliases
    }

    pub fn set_table_aliases(&mut self, table_aliases: impl Into<Arc<TableAliasMap>>) -> &mut Self {
        self.table_aliases = table_aliases.into();
        self
    }

    /// Share the alias metadata of `other`
    pub fn copy_aliases(&mut self, other: &Query) -> &mut Self {
        self.alias_map = Arc::clone(&other.alias_map);
        self.table_aliases = Arc::clone(&other.table_aliases);
        self
    }

    /// A fresh query sharing this query's alias metadata and configuration
    pub fn create_subquery(&self) -> Query {
        let mut subquery = Query::new().with_config(self.config.clone());
        subquery.copy_aliases(self);
        subquery.is_subquery = true;
        subquery
    }

    pub fn is_subquery(&self) -> bool {
        self.is_subquery
    }

    pub fn aggregates(&self) -> &AggregateSpec {
        &self.aggregates
    }

    pub fn set_aggregates(&mut self, aggregates: AggregateSpec) -> &mut Self {
        self.aggregates = aggregates;
        self
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn set_params(&mut self, params: Vec<Value>) -> &mut Self {
        self.params = params;
        self
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn set_query_type(&mut self, query_type: QueryType) -> &mut Self {
        self.query_type = query_type;
        self
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn set_view(&mut self, view: View) -> &mut Self {
        self.view = Some(view);
        self
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        self.sql = sql.into();
        self
    }

    /// SQL sent to the executor; a view's select SQL takes precedence
    pub fn sql(&self) -> &str {
        match &self.view {
            Some(view) => view.select_sql(),
            None => &self.sql,
        }
    }

    /// Get a query part by name
    pub fn query_part(&self, name: &str) -> HydrateResult<QueryPart<'_>> {
        match name {
            "limit" => Ok(QueryPart::Bound(self.parts.limit)),
            "offset" => Ok(QueryPart::Bound(self.parts.offset)),
            _ => self
                .parts
                .clauses(name)
                .map(|clauses| QueryPart::Clauses(clauses.as_slice()))
                .ok_or_else(|| HydrateError::UnknownQueryPart(name.to_string())),
        }
    }

    /// Append a clause to a list part
    pub fn add_part(&mut self, name: &str, clause: impl Into<String>) -> HydrateResult<&mut Self> {
        self.parts
            .clauses_mut(name)
            .ok_or_else(|| HydrateError::UnknownQueryPart(name.to_string()))?
            .push(clause.into());
        Ok(self)
    }

    pub fn set_limit(&mut self, limit: Option<u64>) -> &mut Self {
        self.parts.limit = limit;
        self
    }

    pub fn set_offset(&mut self, offset: Option<u64>) -> &mut Self {
        self.parts.offset = offset;
        self
    }

    /// Reset one part; unknown names are ignored
    pub fn remove(&mut self, name: &str) -> &mut Self {
        match name {
            "limit" => self.parts.limit = None,
            "offset" => self.parts.offset = None,
            _ => {
                if let Some(clauses) = self.parts.clauses_mut(name) {
                    clauses.clear();
                }
            }
        }
        self
    }

    /// Reset every part and forget the table aliases
    pub fn clear(&mut self) {
        self.parts = QueryParts::default();
        self.table_aliases = Arc::new(TableAliasMap::new());
    }

    /// Discriminator predicate for the entities of this query
    pub fn inheritance_filter(&self) -> String {
        InheritanceFilterBuilder::new(self.query_type).build_for(&self.alias_map, &self.table_aliases)
    }

    /// Stored parameters followed by `params`, booleans adapted to `dialect`
    pub fn bound_params(&self, dialect: SqlDialect, params: &[Value]) -> Vec<Value> {
        let merged = self.params.iter().chain(params).cloned().collect();
        dialect.convert_booleans(merged)
    }

    /// Run the query through `executor` and hydrate the result
    pub fn execute<E>(&self, executor: &E, params: &[Value]) -> HydrateResult<Collection>
    where
        E: QueryExecutor + ?Sized,
    {
        if self.alias_map.is_empty() {
            return Err(HydrateError::EmptyAliasMap);
        }

        let params = self.bound_params(executor.dialect(), params);
        debug!("Executing hydrating query with {} params: {}", params.len(), self.sql());

        let mut cursor = executor.execute(self.sql(), &params)?;
        self.hydrator().hydrate(cursor.as_mut())
    }

    /// Like [`Query::execute`], awaiting only the cursor opening
    pub async fn execute_async<E>(&self, executor: &E, params: &[Value]) -> HydrateResult<Collection>
    where
        E: AsyncQueryExecutor + ?Sized,
    {
        if self.alias_map.is_empty() {
            return Err(HydrateError::EmptyAliasMap);
        }

        let params = self.bound_params(executor.dialect(), params);
        debug!("Executing hydrating query with {} params: {}", params.len(), self.sql());

        let mut cursor = executor.open_cursor(self.sql(), &params).await?;
        self.hydrator().hydrate(cursor.as_mut())
    }

    fn hydrator(&self) -> Hydrator<'_> {
        Hydrator::new(&self.alias_map, &self.table_aliases)
            .with_aggregates(&self.aggregates)
            .with_config(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use async_trait::async_trait;

    use super::*;
    use crate::alias_map::Relation;
    use crate::backends::{BufferedCursor, Cursor};
    use crate::descriptor::Table;
    use crate::row::FlatRow;

    struct CountingCursor {
        inner: BufferedCursor,
        closes: Rc<Cell<usize>>,
    }

    impl Cursor for CountingCursor {
        fn next_row(&mut self) -> HydrateResult<Option<FlatRow>> {
            self.inner.next_row()
        }

        fn close(&mut self) -> HydrateResult<()> {
            self.closes.set(self.closes.get() + 1);
            self.inner.close()
        }
    }

    struct MockExecutor {
        dialect: SqlDialect,
        rows: Vec<FlatRow>,
        calls: Cell<usize>,
        closes: Rc<Cell<usize>>,
        seen: RefCell<Option<(String, Vec<Value>)>>,
    }

    impl MockExecutor {
        fn new(dialect: SqlDialect, rows: Vec<FlatRow>) -> Self {
            Self {
                dialect,
                rows,
                calls: Cell::new(0),
                closes: Rc::new(Cell::new(0)),
                seen: RefCell::new(None),
            }
        }
    }

    impl QueryExecutor for MockExecutor {
        fn dialect(&self) -> SqlDialect {
            self.dialect
        }

        fn execute(&self, sql: &str, params: &[Value]) -> HydrateResult<Box<dyn Cursor + '_>> {
            self.calls.set(self.calls.get() + 1);
            *self.seen.borrow_mut() = Some((sql.to_string(), params.to_vec()));
            Ok(Box::new(CountingCursor {
                inner: BufferedCursor::new(self.rows.clone()),
                closes: Rc::clone(&self.closes),
            }))
        }
    }

    struct MockAsyncExecutor {
        rows: Vec<FlatRow>,
    }

    #[async_trait]
    impl AsyncQueryExecutor for MockAsyncExecutor {
        fn dialect(&self) -> SqlDialect {
            SqlDialect::PostgreSQL
        }

        async fn open_cursor(&self, _sql: &str, _params: &[Value]) -> HydrateResult<Box<dyn Cursor + Send>> {
            Ok(Box::new(BufferedCursor::new(self.rows.clone())))
        }
    }

    fn user_query() -> Query {
        let mut query = Query::new();
        query
            .set_alias_map(
                AliasMap::new()
                    .with_root("User", Table::new("User"))
                    .with_join("User.posts", "User", Relation::to_many("posts"), Table::new("Post")),
            )
            .set_table_aliases(TableAliasMap::new().with_alias("u", "User").with_alias("p", "User.posts"))
            .set_sql("SELECT u.id AS u__id, p.id AS p__id FROM users u LEFT JOIN posts p ON p.user_id = u.id");
        query
    }

    fn rows() -> Vec<FlatRow> {
        vec![
            FlatRow::new().with_column("u__id", 1).with_column("p__id", 10),
            FlatRow::new().with_column("u__id", 1).with_column("p__id", 11),
            FlatRow::new().with_column("u__id", 2).with_column("p__id", Value::Null),
        ]
    }

    #[test]
    fn test_execute_hydrates_and_closes_cursor_once() {
        let query = user_query();
        let executor = MockExecutor::new(SqlDialect::PostgreSQL, rows());

        let users = query.execute(&executor, &[]).unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users.get(0).unwrap().collection("posts").unwrap().len(), 2);
        assert_eq!(executor.calls.get(), 1);
        assert_eq!(executor.closes.get(), 1);
    }

    #[test]
    fn test_execute_with_empty_alias_map_never_opens_cursor() {
        let query = Query::new();
        let executor = MockExecutor::new(SqlDialect::PostgreSQL, rows());

        let err = query.execute(&executor, &[]).unwrap_err();

        assert!(matches!(err, HydrateError::EmptyAliasMap));
        assert_eq!(executor.calls.get(), 0);
    }

    #[test]
    fn test_unknown_alias_still_closes_cursor() {
        let query = user_query();
        let executor = MockExecutor::new(
            SqlDialect::PostgreSQL,
            vec![FlatRow::new().with_column("u__id", 1).with_column("zz__id", 1)],
        );

        assert!(query.execute(&executor, &[]).is_err());
        assert_eq!(executor.closes.get(), 1);
    }

    #[test]
    fn test_params_are_merged_and_booleans_converted() {
        let mut query = user_query();
        query.set_params(vec![Value::from(true)]);
        let executor = MockExecutor::new(SqlDialect::MySQL, rows());

        query.execute(&executor, &[Value::from("x"), Value::from(false)]).unwrap();

        let (_, params) = executor.seen.borrow().clone().unwrap();
        assert_eq!(params, vec![Value::Int32(1), Value::from("x"), Value::Int32(0)]);
    }

    #[test]
    fn test_view_sql_replaces_query_sql() {
        let mut query = user_query();
        query.set_view(View::new("active_users", "SELECT * FROM active_users"));
        let executor = MockExecutor::new(SqlDialect::PostgreSQL, vec![]);

        query.execute(&executor, &[]).unwrap();

        let (sql, _) = executor.seen.borrow().clone().unwrap();
        assert_eq!(sql, "SELECT * FROM active_users");
        assert_eq!(query.view().unwrap().name(), "active_users");
    }

    #[test]
    fn test_query_parts() {
        let mut query = Query::new();
        query.add_part("where", "u.id = ?").unwrap();
        query.add_part("where", "u.active = ?").unwrap();
        query.set_limit(Some(10));

        assert_eq!(
            query.query_part("where").unwrap(),
            QueryPart::Clauses(&["u.id = ?".to_string(), "u.active = ?".to_string()])
        );
        assert_eq!(query.query_part("limit").unwrap(), QueryPart::Bound(Some(10)));
        assert!(matches!(
            query.query_part("bogus"),
            Err(HydrateError::UnknownQueryPart(ref name)) if name == "bogus"
        ));
        assert!(query.add_part("bogus", "x").is_err());

        query.remove("where").remove("limit").remove("bogus");
        assert_eq!(query.query_part("where").unwrap(), QueryPart::Clauses(&[]));
        assert_eq!(query.query_part("limit").unwrap(), QueryPart::Bound(None));
    }

    #[test]
    fn test_clear_resets_parts_and_table_aliases() {
        let mut query = user_query();
        query.add_part("select", "u.id").unwrap();
        query.set_offset(Some(5));

        query.clear();

        assert_eq!(query.query_part("select").unwrap(), QueryPart::Clauses(&[]));
        assert_eq!(query.query_part("offset").unwrap(), QueryPart::Bound(None));
        assert!(query.table_aliases().is_empty());
        assert_eq!(query.alias_map().len(), 2);
    }

    #[test]
    fn test_subquery_shares_alias_metadata() {
        let query = user_query();
        let subquery = query.create_subquery();

        assert!(subquery.is_subquery());
        assert!(!query.is_subquery());
        assert!(Arc::ptr_eq(subquery.alias_map(), query.alias_map()));
        assert!(Arc::ptr_eq(subquery.table_aliases(), query.table_aliases()));
        assert_eq!(subquery.query_type(), QueryType::Select);
    }

    #[test]
    fn test_inheritance_filter_follows_query_type() {
        let mut query = Query::new();
        query
            .set_alias_map(AliasMap::new().with_root("Entity", Table::new("Entity").with_discriminator("type", 1)))
            .set_table_aliases(TableAliasMap::new().with_alias("e", "Entity"));

        assert_eq!(query.inheritance_filter(), "e.type = 1");
        query.set_query_type(QueryType::Delete);
        assert_eq!(query.inheritance_filter(), "type = 1");
    }

    #[tokio::test]
    async fn test_execute_async() {
        let query = user_query();
        let executor = MockAsyncExecutor { rows: rows() };

        let users = query.execute_async(&executor, &[]).await.unwrap();

        assert_eq!(users.len(), 2);
        assert!(!users.get(1).unwrap().has_reference("posts"));
    }

    #[tokio::test]
    async fn test_execute_async_with_empty_alias_map() {
        let executor = MockAsyncExecutor { rows: rows() };
        let err = Query::new().execute_async(&executor, &[]).await.unwrap_err();
        assert!(matches!(err, HydrateError::EmptyAliasMap));
    }
}
