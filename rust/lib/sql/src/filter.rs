//! WHERE-clause builder for optional, multi-dimensional filters.
//!
//! Every caller value is bound through a positional placeholder assigned
//! here. Column names are `&'static str`, so only identifiers written in
//! code can reach the SQL text.
//!
//! ```ignore
//! let mut filter = Filter::new("deleted_at IS NULL");
//! filter.eq("merchant_id", merchant);
//! filter.in_csv("status", &query.status, MemberStatus::parse_value)?;
//! filter.search(&query.search, &rule);
//! let (sql, params) = filter.page_query("SELECT data", "members", &sort, &page);
//! ```

use memberd_core::{PageRequest, ServiceError};

use crate::sort::{Sort, SortColumn};
use crate::traits::Value;

/// Placeholder syntax of the target driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholder {
    /// `?1`, `?2`, ... (SQLite)
    #[default]
    Numbered,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
}

impl Placeholder {
    fn render(self, index: usize) -> String {
        match self {
            Placeholder::Numbered => format!("?{index}"),
            Placeholder::Dollar => format!("${index}"),
        }
    }
}

/// Which column a free-text search was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    Id,
    Email,
    Name,
}

/// Columns consulted by [`Filter::search`].
#[derive(Debug, Clone)]
pub struct SearchRule {
    /// Prefix that marks a value as a domain ID, e.g. `MBR-`.
    pub id_prefix: String,
    pub id_column: &'static str,
    pub email_column: &'static str,
    /// Matched case-insensitively; several columns form an OR-group.
    pub name_columns: &'static [&'static str],
}

impl SearchRule {
    /// Route a search value. First match wins, in this order:
    /// ID prefix, then `@`, then name.
    pub fn classify(&self, raw: &str) -> Option<SearchTarget> {
        let value = raw.trim();
        if value.is_empty() {
            None
        } else if !self.id_prefix.is_empty() && value.starts_with(self.id_prefix.as_str()) {
            Some(SearchTarget::Id)
        } else if value.contains('@') {
            Some(SearchTarget::Email)
        } else {
            Some(SearchTarget::Name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    style: Placeholder,
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    /// Start from a mandatory base predicate such as `deleted_at IS NULL`.
    pub fn new(base: &'static str) -> Self {
        Self {
            style: Placeholder::default(),
            clauses: vec![base.to_string()],
            params: Vec::new(),
        }
    }

    pub fn with_placeholder(mut self, style: Placeholder) -> Self {
        self.style = style;
        self
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.style.render(self.params.len())
    }

    fn push_cmp(&mut self, column: &'static str, op: &str, value: Value) -> &mut Self {
        let ph = self.bind(value);
        self.clauses.push(format!("{column} {op} {ph}"));
        self
    }

    pub fn eq(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        self.push_cmp(column, "=", value.into())
    }

    pub fn gte(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        self.push_cmp(column, ">=", value.into())
    }

    pub fn lte(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        self.push_cmp(column, "<=", value.into())
    }

    /// `column = ?` only when `value` is present and not blank.
    pub fn eq_opt(&mut self, column: &'static str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.eq(column, v);
        }
        self
    }

    /// `column IN (?, ?, ...)`, one placeholder per value in input order.
    /// An empty list adds nothing.
    pub fn in_list<V: Into<Value>>(
        &mut self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        let placeholders: Vec<String> = values
            .into_iter()
            .map(|v| self.bind(v.into()))
            .collect();
        if !placeholders.is_empty() {
            self.clauses
                .push(format!("{column} IN ({})", placeholders.join(", ")));
        }
        self
    }

    /// Comma-separated multi-value filter. Each segment is trimmed, blank
    /// segments are dropped, and every value must pass `parse`; one bad
    /// value rejects the whole filter before anything is bound.
    pub fn in_csv<T, F>(&mut self, column: &'static str, raw: &str, parse: F) -> Result<&mut Self, ServiceError>
    where
        T: Into<Value>,
        F: Fn(&str) -> Result<T, ServiceError>,
    {
        let values = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse)
            .collect::<Result<Vec<T>, ServiceError>>()?;
        Ok(self.in_list(column, values))
    }

    /// Case-insensitive substring match. LIKE wildcards in `needle` are
    /// escaped so they match literally.
    pub fn like_ci(&mut self, column: &'static str, needle: &str) -> &mut Self {
        let ph = self.bind(Value::Text(like_pattern(needle)));
        self.clauses
            .push(format!("LOWER({column}) LIKE {ph} ESCAPE '\\'"));
        self
    }

    /// Add one parenthesized OR-group. Nothing is added if `build` adds no
    /// alternatives.
    pub fn any_of(&mut self, build: impl FnOnce(&mut Group<'_>)) -> &mut Self {
        let mut group = Group {
            filter: self,
            alternatives: Vec::new(),
        };
        build(&mut group);
        let alternatives = group.alternatives;
        if !alternatives.is_empty() {
            self.clauses
                .push(format!("({})", alternatives.join(" OR ")));
        }
        self
    }

    /// Free-text search routed by [`SearchRule::classify`]. Blank input
    /// adds nothing.
    pub fn search(&mut self, raw: &str, rule: &SearchRule) -> Option<SearchTarget> {
        let target = rule.classify(raw)?;
        let value = raw.trim();
        match target {
            SearchTarget::Id => {
                self.eq(rule.id_column, value);
            }
            SearchTarget::Email => {
                let ph = self.bind(Value::Text(value.to_lowercase()));
                self.clauses
                    .push(format!("LOWER({}) = {ph}", rule.email_column));
            }
            SearchTarget::Name => {
                self.any_of(|g| {
                    for &column in rule.name_columns {
                        g.like_ci(column, value);
                    }
                });
            }
        }
        Some(target)
    }

    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Value>) {
        (self.clauses, self.params)
    }

    /// `WHERE a AND b AND ...`
    pub fn where_sql(&self) -> String {
        format!("WHERE {}", self.clauses.join(" AND "))
    }

    /// `SELECT COUNT(*) AS cnt FROM table WHERE ...`
    pub fn count_query(&self, table: &'static str) -> (String, Vec<Value>) {
        (
            format!("SELECT COUNT(*) AS cnt FROM {table} {}", self.where_sql()),
            self.params.clone(),
        )
    }

    /// `{select} FROM table WHERE ... ORDER BY ... LIMIT ? OFFSET ?`
    pub fn page_query<C: SortColumn>(
        &self,
        select: &'static str,
        table: &'static str,
        sort: &Sort<C>,
        page: &PageRequest,
    ) -> (String, Vec<Value>) {
        let mut params = self.params.clone();
        params.push(Value::from(page.limit));
        let limit_ph = self.style.render(params.len());
        params.push(Value::from(page.offset));
        let offset_ph = self.style.render(params.len());
        (
            format!(
                "{select} FROM {table} {} {} LIMIT {limit_ph} OFFSET {offset_ph}",
                self.where_sql(),
                sort.to_sql()
            ),
            params,
        )
    }
}

/// Alternatives of one OR-group; shares placeholder numbering with the
/// parent filter.
pub struct Group<'a> {
    filter: &'a mut Filter,
    alternatives: Vec<String>,
}

impl Group<'_> {
    pub fn eq(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        let ph = self.filter.bind(value.into());
        self.alternatives.push(format!("{column} = {ph}"));
        self
    }

    pub fn like_ci(&mut self, column: &'static str, needle: &str) -> &mut Self {
        let ph = self.filter.bind(Value::Text(like_pattern(needle)));
        self.alternatives
            .push(format!("LOWER({column}) LIKE {ph} ESCAPE '\\'"));
        self
    }
}

fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.trim().to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
