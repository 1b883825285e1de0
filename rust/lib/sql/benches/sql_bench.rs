use criterion::{black_box, criterion_group, criterion_main, Criterion};

use memberd_core::Paginator;
use memberd_sql::{Filter, SQLStore, SearchRule, Sort, SortColumn, SortDirection, SqliteStore, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Col {
    Name,
}

impl SortColumn for Col {
    const ALL: &'static [Self] = &[Self::Name];

    fn key(self) -> &'static str {
        "name"
    }

    fn column(self) -> &'static str {
        "name"
    }
}

fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .exec_batch(
            "CREATE TABLE bench (id TEXT PRIMARY KEY, name TEXT, email TEXT, status TEXT, deleted_at TEXT);
             CREATE INDEX idx_bench_status ON bench(status);",
        )
        .unwrap();

    for i in 0..10000 {
        let status = if i % 3 == 0 { "inactive" } else { "active" };
        store
            .exec(
                "INSERT INTO bench (id, name, email, status) VALUES (?1, ?2, ?3, ?4)",
                &[
                    Value::Text(format!("MBR-{i}")),
                    Value::Text(format!("member {i}")),
                    Value::Text(format!("m{i}@example.com")),
                    Value::from(status),
                ],
            )
            .unwrap();
    }
    store
}

fn rule() -> SearchRule {
    SearchRule {
        id_prefix: "MBR-".into(),
        id_column: "id",
        email_column: "email",
        name_columns: &["name"],
    }
}

fn bench_build_filter(c: &mut Criterion) {
    let rule = rule();
    c.bench_function("filter_build", |b| {
        b.iter(|| {
            let mut filter = Filter::new("deleted_at IS NULL");
            filter
                .in_csv("status", black_box("active,inactive"), |s| Ok(s.to_string()))
                .unwrap();
            filter.search(black_box("member 12"), &rule);
            black_box(filter.where_sql());
        });
    });
}

fn bench_filtered_page(c: &mut Criterion) {
    let store = seeded_store();
    let rule = rule();
    let page = Paginator::default().resolve("3", "20").unwrap();
    let sort = Sort::new(Col::Name, SortDirection::Asc);

    c.bench_function("sqlite_filtered_page_20", |b| {
        b.iter(|| {
            let mut filter = Filter::new("deleted_at IS NULL");
            filter.eq("status", "active");
            filter.search(black_box("member 1"), &rule);
            let (sql, params) = filter.page_query("SELECT id", "bench", &sort, &page);
            let rows = store.query(&sql, &params).unwrap();
            assert_eq!(rows.len(), 20);
        });
    });
}

fn bench_count(c: &mut Criterion) {
    let store = seeded_store();
    c.bench_function("sqlite_filtered_count", |b| {
        b.iter(|| {
            let mut filter = Filter::new("deleted_at IS NULL");
            filter.in_list("status", ["inactive"]);
            let (sql, params) = filter.count_query("bench");
            let rows = store.query(&sql, &params).unwrap();
            assert_eq!(rows[0].get_i64("cnt"), Some(3334));
        });
    });
}

criterion_group!(benches, bench_build_filter, bench_filtered_page, bench_count);
criterion_main!(benches);
