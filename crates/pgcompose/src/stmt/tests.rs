use super::*;
use crate::condition::{gt, is_in};
use crate::executor::RawRow;
use crate::fragment::{Param, parent};
use crate::nested::nested;
use crate::schema::TableSchema;
use crate::shape::LateralSlot;
use crate::{record, whereable};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Mutex;

// ── Shared recording executor for tests ──

#[derive(Default)]
struct RecordingExecutor {
    rows: Vec<RawRow>,
    schema: Option<Schema>,
    statements: Mutex<Vec<(String, usize)>>,
}

impl RecordingExecutor {
    fn returning(rows: Vec<Value>) -> Self {
        Self {
            rows: rows.into_iter().map(raw).collect(),
            ..Self::default()
        }
    }

    fn statements(&self) -> Vec<(String, usize)> {
        self.statements.lock().unwrap().clone()
    }
}

impl Executor for RecordingExecutor {
    async fn query_rows(&self, sql: &str, params: &[Param]) -> DbResult<Vec<RawRow>> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.len()));
        Ok(self.rows.clone())
    }

    fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }
}

fn raw(value: Value) -> RawRow {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn shop_schema() -> Schema {
    Schema::new()
        .with_table(TableSchema::new("shop", "user").with_columns(&["id", "first_name"]))
        .with_table(TableSchema::new("shop", "order").with_columns(&["id", "user_id"]))
}

// ==================== select: plain ====================

#[test]
fn select_all_columns_with_tail() {
    let compiled = select("shop.user", whereable! { "last_name" => "Charpin" })
        .order_by(OrderBy::desc("id"))
        .limit(10)
        .offset(5)
        .compile()
        .unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT to_jsonb("user".*) AS "result" FROM "shop"."user" AS "user" WHERE "user"."last_name" = $1 ORDER BY "user"."id" DESC LIMIT $2 OFFSET $3"#
    );
    assert_eq!(compiled.param_count(), 3);
}

#[test]
fn empty_filter_omits_where() {
    let query = select("shop.user", Whereable::all());
    assert_eq!(
        query.to_sql(),
        r#"SELECT to_jsonb("user".*) AS "result" FROM "shop"."user" AS "user""#
    );
    assert_eq!(query.result_mode(), ResultMode::RowArray);
}

#[test]
fn select_one_projects_columns_and_limits() {
    let query = select_one("shop.user", whereable! { "id" => 1_i64 }).columns(["id", "first_name"]);
    let compiled = query.compile().unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT jsonb_build_object('id', "user"."id", 'first_name', "user"."first_name") AS "result" FROM "shop"."user" AS "user" WHERE "user"."id" = $1 LIMIT $2"#
    );
    assert_eq!(compiled.param_count(), 2);
    assert_eq!(query.result_mode(), ResultMode::Row);
}

#[test]
fn select_one_ignores_explicit_limit() {
    let compiled = select_one("shop.user", Whereable::all())
        .limit(20)
        .compile()
        .unwrap();
    assert_eq!(compiled.param_count(), 1);
    assert!(compiled.sql.ends_with(" LIMIT $1"));
}

#[test]
fn extras_are_merged_into_row_objects() {
    let sql_text = select("shop.product", Whereable::all())
        .extras("label", sql("upper(").ident("name").text(")"))
        .extras("label", sql("lower(").ident("name").text(")"))
        .to_sql();
    assert_eq!(
        sql_text,
        r#"SELECT to_jsonb("product".*) || jsonb_build_object('label', lower("name")) AS "result" FROM "shop"."product" AS "product""#
    );
}

#[test]
fn wide_projections_are_chunked() {
    let columns: Vec<String> = (0..60).map(|i| format!("c{i}")).collect();
    let sql_text = select("wide", Whereable::all()).columns(columns).to_sql();
    assert_eq!(sql_text.matches("jsonb_build_object(").count(), 2);
    assert!(sql_text.contains(r#""wide"."c49") || jsonb_build_object('c50', "wide"."c50""#));
}

#[test]
fn column_projections_are_scalar() {
    let column = select("shop.user", Whereable::all()).column("first_name");
    assert_eq!(column.result_mode(), ResultMode::ColumnArray);
    assert_eq!(
        column.to_sql(),
        r#"SELECT to_jsonb("user"."first_name") AS "result" FROM "shop"."user" AS "user""#
    );

    let one = select_one("shop.user", Whereable::all()).column("first_name");
    assert_eq!(one.result_mode(), ResultMode::Column);

    let forced = select_one("shop.user", Whereable::all()).array("first_name");
    assert_eq!(forced.result_mode(), ResultMode::ColumnArray);

    let expr = select_one("shop.user", Whereable::all()).extra(sql("now()"));
    assert!(expr.to_sql().starts_with(r#"SELECT to_jsonb(now()) AS "result""#));
}

#[test]
fn aggregates_compile_to_scalars() {
    let total = count("shop.order", whereable! { "user_id" => 1_i32 });
    assert_eq!(total.result_mode(), ResultMode::Column);
    assert_eq!(
        total.to_sql(),
        r#"SELECT to_jsonb(count(*)) AS "result" FROM "shop"."order" AS "order" WHERE "order"."user_id" = $1"#
    );

    assert_eq!(
        sum("shop.product", Whereable::all(), "price").to_sql(),
        r#"SELECT to_jsonb(sum("product"."price")) AS "result" FROM "shop"."product" AS "product""#
    );
    assert!(avg("shop.product", Whereable::all(), "price").to_sql().contains("avg(\"product\".\"price\")"));
    assert!(min("shop.product", Whereable::all(), "price").to_sql().contains("min("));
    assert!(max("shop.product", Whereable::all(), "price").to_sql().contains("max("));
}

#[test]
fn aggregates_reject_ordering_and_reprojection() {
    let ordered = count("shop.order", Whereable::all()).order_by(OrderBy::asc("id"));
    assert!(matches!(ordered.compile(), Err(DbError::Validation(_))));

    let reprojected = count("shop.order", Whereable::all()).column("id");
    assert!(matches!(reprojected.compile(), Err(DbError::Validation(_))));
    assert!(reprojected.to_sql().starts_with("<build error:"));
}

#[test]
fn lock_clause_follows_the_tail() {
    let sql_text = select("shop.user", Whereable::all())
        .lock(Lock::for_update().of(["user"]).skip_locked())
        .to_sql();
    assert!(sql_text.ends_with(r#" FROM "shop"."user" AS "user" FOR UPDATE OF "user" SKIP LOCKED"#));

    let sql_text = select_one("shop.user", whereable! { "id" => 1_i32 })
        .lock(Lock::for_key_share().nowait())
        .to_sql();
    assert!(sql_text.ends_with(" LIMIT $2 FOR KEY SHARE NOWAIT"));
}

#[test]
fn lock_is_rejected_outside_plain_top_level_selects() {
    let with_lateral = select("shop.user", Whereable::all())
        .lock(Lock::for_share())
        .lateral("orders", select("shop.order", whereable! { "user_id" => parent("id") }));
    assert!(matches!(with_lateral.compile(), Err(DbError::Validation(_))));

    let locked_child = select("shop.user", Whereable::all()).lateral(
        "orders",
        select("shop.order", whereable! { "user_id" => parent("id") }).lock(Lock::for_update()),
    );
    assert!(matches!(locked_child.compile(), Err(DbError::Validation(_))));

    let aggregate = count("shop.user", Whereable::all()).lock(Lock::for_update());
    assert!(matches!(aggregate.compile(), Err(DbError::Validation(_))));
}

// ==================== select: laterals ====================

#[test]
fn top_level_lateral_fans_out_with_ordinals() {
    let query = select("shop.user", Whereable::all())
        .order_by(OrderBy::asc("id"))
        .lateral(
            "orders",
            select("shop.order", whereable! { "user_id" => parent("id") })
                .order_by(OrderBy::asc("id")),
        );
    let (fragment, plan) = query.build(&Scope::root(None)).unwrap();
    let compiled = fragment.render().unwrap();

    assert_eq!(
        compiled.sql,
        concat!(
            r#"SELECT "user"."$row" AS "$row", (to_jsonb("user".*) - '$row') AS "result", "#,
            r#""lateral_0"."$row" AS "lateral_0$row", "lateral_0"."result" AS "lateral_0" "#,
            r#"FROM (SELECT "user".*, row_number() OVER (ORDER BY "user"."id" ASC) AS "$row" "#,
            r#"FROM "shop"."user" AS "user" ORDER BY "user"."id" ASC) AS "user" "#,
            r#"LEFT JOIN LATERAL (SELECT to_jsonb("order_1".*) AS "result", "#,
            r#"row_number() OVER (ORDER BY "order_1"."id" ASC) AS "$row" "#,
            r#"FROM "shop"."order" AS "order_1" WHERE "order_1"."user_id" = "user"."id" "#,
            r#"ORDER BY "order_1"."id" ASC) AS "lateral_0" ON true "#,
            r#"ORDER BY "user"."$row""#,
        )
    );
    assert_eq!(compiled.param_count(), 0);
    assert_eq!(plan.mode, ResultMode::RowArray);
    assert_eq!(
        plan.laterals,
        vec![LateralSlot {
            property: Some("orders".into()),
            column: "lateral_0".into(),
            ordinal: "lateral_0$row".into(),
            mode: ResultMode::RowArray,
        }]
    );
}

#[test]
fn grandchild_laterals_are_aggregated_in_sql() {
    let query = select("shop.user", Whereable::all()).lateral(
        "orders",
        select("shop.order", whereable! { "user_id" => parent("id") }).lateral(
            "items",
            select("shop.order_item", whereable! { "order_id" => parent("id") }),
        ),
    );

    assert_eq!(
        query.to_sql(),
        concat!(
            r#"SELECT "user"."$row" AS "$row", (to_jsonb("user".*) - '$row') AS "result", "#,
            r#""lateral_0"."$row" AS "lateral_0$row", "lateral_0"."result" AS "lateral_0" "#,
            r#"FROM (SELECT "user".*, row_number() OVER () AS "$row" FROM "shop"."user" AS "user") AS "user" "#,
            r#"LEFT JOIN LATERAL (SELECT to_jsonb("order_1".*) || jsonb_build_object('items', "lateral_1_0"."result") AS "result", "#,
            r#"row_number() OVER () AS "$row" FROM "shop"."order" AS "order_1" "#,
            r#"LEFT JOIN LATERAL (SELECT coalesce(jsonb_agg("sq_2"."result" ORDER BY "sq_2"."$row"), '[]'::jsonb) AS "result" "#,
            r#"FROM (SELECT to_jsonb("order_item_2".*) AS "result", row_number() OVER () AS "$row" "#,
            r#"FROM "shop"."order_item" AS "order_item_2" WHERE "order_item_2"."order_id" = "order_1"."id") AS "sq_2") "#,
            r#"AS "lateral_1_0" ON true WHERE "order_1"."user_id" = "user"."id") AS "lateral_0" ON true "#,
            r#"ORDER BY "user"."$row""#,
        )
    );
}

#[test]
fn ancestors_resolve_two_levels_up() {
    let sql_text = select("shop.user", Whereable::all())
        .lateral(
            "orders",
            select("shop.order", whereable! { "user_id" => parent("id") }).lateral(
                "same_owner",
                count(
                    "shop.order",
                    whereable! { "user_id" => crate::ancestor(2, "id") },
                ),
            ),
        )
        .to_sql();
    assert!(sql_text.contains(r#"WHERE "order_2"."user_id" = "user"."id""#));
    assert!(sql_text.contains(r#"jsonb_build_object('same_owner', "lateral_1_0"."result")"#));
}

#[test]
fn passthrough_lateral_replaces_the_row() {
    let query = select("shop.order", Whereable::all()).passthrough(
        select_one("shop.user", whereable! { "id" => parent("user_id") }).columns(["first_name"]),
    );
    let (fragment, plan) = query.build(&Scope::root(None)).unwrap();
    let compiled = fragment.render().unwrap();

    assert!(compiled.sql.starts_with(
        r#"SELECT "order"."$row" AS "$row", "lateral_0"."$row" AS "lateral_0$row", "lateral_0"."result" AS "lateral_0" FROM"#
    ));
    assert!(compiled.sql.contains(
        r#"(SELECT jsonb_build_object('first_name', "user_1"."first_name") AS "result", row_number() OVER () AS "$row" FROM "shop"."user" AS "user_1" WHERE "user_1"."id" = "order"."user_id" LIMIT $1)"#
    ));
    assert_eq!(compiled.param_count(), 1);
    assert_eq!(plan.laterals[0].property, None);
    assert_eq!(plan.laterals[0].mode, ResultMode::Row);
}

#[test]
fn uncorrelated_laterals_use_a_plain_join() {
    let sql_text = select("shop.user", Whereable::all())
        .lateral("products", select("shop.product", Whereable::all()))
        .to_sql();
    assert!(sql_text.contains(" LEFT JOIN (SELECT "));
    assert!(!sql_text.contains("LATERAL"));
}

#[test]
fn nested_filters_inside_laterals_see_the_outer_row() {
    let favorites = select("shop.favorite", whereable! { "user_id" => parent("id") }).column("product_id");
    let sql_text = select("shop.user", Whereable::all())
        .lateral(
            "favorites",
            select("shop.product", whereable! { "id" => is_in(nested(favorites)) }),
        )
        .to_sql();

    assert!(sql_text.contains(" LEFT JOIN LATERAL ("));
    assert!(sql_text.contains(
        r#"WHERE ("product_1"."id" IN (SELECT "favorite_2"."product_id" FROM "shop"."favorite" AS "favorite_2" WHERE "favorite_2"."user_id" = "user"."id"))"#
    ));
}

#[test]
fn lateral_names_are_replaced_in_place() {
    let query = select("shop.user", Whereable::all())
        .lateral("a", select("shop.order", Whereable::all()))
        .lateral("b", select("shop.product", Whereable::all()))
        .lateral("a", count("shop.order", Whereable::all()));
    match query.laterals() {
        Some(Laterals::Map(entries)) => {
            let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(names, ["a", "b"]);
            assert_eq!(entries[0].1.result_mode(), ResultMode::Column);
        }
        other => panic!("unexpected laterals: {other:?}"),
    }
}

#[test]
fn invalid_lateral_combinations_are_rejected() {
    let mixed = select("shop.user", Whereable::all())
        .lateral("a", select("shop.order", Whereable::all()))
        .passthrough(select("shop.order", Whereable::all()));
    assert!(matches!(mixed.compile(), Err(DbError::Validation(_))));

    let scalar_with_property = select("shop.user", Whereable::all())
        .column("id")
        .lateral("a", select("shop.order", Whereable::all()));
    assert!(matches!(
        scalar_with_property.compile(),
        Err(DbError::Validation(_))
    ));

    let scalar_with_extras = select("shop.user", Whereable::all())
        .column("id")
        .extras("x", sql("1"));
    assert!(matches!(
        scalar_with_extras.compile(),
        Err(DbError::Validation(_))
    ));

    let aggregate = count("shop.user", Whereable::all())
        .passthrough(select("shop.order", Whereable::all()));
    assert!(matches!(aggregate.compile(), Err(DbError::Validation(_))));
}

#[test]
fn references_fail_outside_their_context() {
    let top_parent = select("shop.order", whereable! { "user_id" => parent("id") });
    assert!(matches!(
        top_parent.compile(),
        Err(DbError::UnresolvedParent { .. })
    ));

    let stray_self = select("shop.user", Whereable::all()).extras("x", crate::self_ref());
    assert!(matches!(stray_self.compile(), Err(DbError::UnresolvedSelf)));

    let row_valued = select("shop.user", whereable! {
        "id" => nested(select("shop.order", Whereable::all())),
    });
    assert!(matches!(
        row_valued.compile(),
        Err(DbError::NonScalarNested(ResultMode::RowArray))
    ));
}

// ==================== insert ====================

#[test]
fn insert_embeds_nested_values() {
    let query = insert(
        "shop.favorite",
        record! {
            "user_id" => nested(select_one("shop.user", whereable! { "first_name" => "Nico" }).column("id")),
            "product_id" => 4_i32,
        },
    );
    let compiled = query.compile().unwrap();

    assert_eq!(
        compiled.sql,
        r#"INSERT INTO "shop"."favorite" AS "favorite" ("user_id", "product_id") VALUES ((SELECT "user_1"."id" FROM "shop"."user" AS "user_1" WHERE "user_1"."first_name" = $1 LIMIT $2), $3) RETURNING to_jsonb("favorite".*) AS "result""#
    );
    assert_eq!(compiled.param_count(), 3);
    assert_eq!(query.result_mode(), ResultMode::Row);
}

#[test]
fn insert_many_fills_missing_columns_with_default() {
    let query = insert_many(
        "shop.product",
        [
            record! { "name" => "Shoe", "price" => 19.5_f64 },
            record! { "name" => "Sock" },
        ],
    )
    .returning(["id"]);

    assert_eq!(
        query.to_sql(),
        r#"INSERT INTO "shop"."product" AS "product" ("name", "price") VALUES ($1, $2), ($3, DEFAULT) RETURNING jsonb_build_object('id', "product"."id") AS "result""#
    );
    assert_eq!(query.result_mode(), ResultMode::RowArray);
}

#[test]
fn insert_edge_cases() {
    assert_eq!(
        insert("shop.audit", Record::new()).to_sql(),
        r#"INSERT INTO "shop"."audit" AS "audit" DEFAULT VALUES RETURNING to_jsonb("audit".*) AS "result""#
    );
    assert_eq!(
        insert_many("shop.audit", Vec::new()).to_sql(),
        r#"SELECT NULL::jsonb AS "result" WHERE false"#
    );
    let several_empty = insert_many("shop.audit", [Record::new(), Record::new()]);
    assert!(matches!(several_empty.compile(), Err(DbError::Validation(_))));

    let defaulted = insert("shop.product", record! { "created_at" => crate::sql_default() });
    assert!(defaulted.to_sql().contains(r#"("created_at") VALUES (DEFAULT)"#));
}

#[test]
fn record_replaces_values_in_place() {
    let record = record! { "a" => 1_i32, "b" => 2_i32, "a" => 3_i32 };
    assert_eq!(record.len(), 2);
    assert_eq!(record.columns().collect::<Vec<_>>(), ["a", "b"]);
    assert!(record.get("c").is_none());
}

// ==================== update / delete ====================

#[test]
fn update_resolves_self_to_the_assigned_column() {
    let query = update(
        "shop.product",
        record! {
            "price" => sql("").self_ref().text(" * 2"),
            "name" => "Boot",
        },
        whereable! { "id" => 3_i32 },
    );
    assert_eq!(
        query.to_sql(),
        r#"UPDATE "shop"."product" AS "product" SET "price" = "product"."price" * 2, "name" = $1 WHERE "product"."id" = $2 RETURNING to_jsonb("product".*) AS "result""#
    );
    assert_eq!(query.result_mode(), ResultMode::RowArray);
}

#[test]
fn update_requires_values() {
    let query = update("shop.product", Record::new(), Whereable::all());
    assert!(matches!(query.compile(), Err(DbError::Validation(_))));
}

#[test]
fn delete_with_condition_and_returning() {
    let query = deletes("shop.order", whereable! { "id" => is_in(vec![1_i32, 2]) })
        .returning(["id"])
        .extras("late", sql("true"));
    assert_eq!(
        query.to_sql(),
        r#"DELETE FROM "shop"."order" AS "order" WHERE ("order"."id" IN ($1, $2)) RETURNING jsonb_build_object('id', "order"."id") || jsonb_build_object('late', true) AS "result""#
    );

    assert_eq!(
        deletes("shop.order", Whereable::all()).to_sql(),
        r#"DELETE FROM "shop"."order" AS "order" RETURNING to_jsonb("order".*) AS "result""#
    );
}

// ==================== upsert ====================

const ACTION_SQL: &str = r#"jsonb_build_object('$action', CASE "user".xmax WHEN 0 THEN 'INSERT' ELSE 'UPDATE' END)"#;

#[test]
fn upsert_updates_non_conflict_columns() {
    let query = upsert(
        "shop.user",
        record! { "email" => "ann@example.com", "first_name" => "Ann" },
        "email",
    );
    assert_eq!(
        query.to_sql(),
        format!(
            r#"INSERT INTO "shop"."user" AS "user" ("email", "first_name") VALUES ($1, $2) ON CONFLICT ("email") DO UPDATE SET "first_name" = EXCLUDED."first_name" RETURNING to_jsonb("user".*) || {ACTION_SQL} AS "result""#
        )
    );
    assert_eq!(query.result_mode(), ResultMode::Row);
}

#[test]
fn upsert_keeps_current_values_for_null_columns() {
    let sql_text = upsert(
        "shop.user",
        record! { "email" => "ann@example.com", "first_name" => None::<String> },
        ["email"],
    )
    .no_null_update_columns(["first_name"])
    .suppress_action()
    .to_sql();

    assert!(sql_text.contains(
        r#"DO UPDATE SET "first_name" = CASE WHEN EXCLUDED."first_name" IS NULL THEN "user"."first_name" ELSE EXCLUDED."first_name" END"#
    ));
    assert!(sql_text.ends_with(r#"RETURNING to_jsonb("user".*) AS "result""#));
}

#[test]
fn upsert_with_nothing_to_update() {
    let by_column = upsert("shop.user", record! { "email" => "a@b.c" }, "email").to_sql();
    assert!(by_column.contains(r#"ON CONFLICT ("email") DO UPDATE SET "email" = EXCLUDED."email" RETURNING"#));

    let by_constraint = upsert(
        "shop.user",
        record! { "email" => "a@b.c" },
        on_constraint("user_email_key"),
    )
    .update_columns(Vec::<String>::new())
    .to_sql();
    assert!(by_constraint.contains(r#"ON CONFLICT ON CONSTRAINT "user_email_key" DO NOTHING RETURNING"#));
}

#[test]
fn upsert_many_and_explicit_update_columns() {
    let query = upsert_many(
        "shop.user",
        [
            record! { "email" => "a@b.c", "first_name" => "A", "last_name" => "X" },
            record! { "email" => "d@e.f", "first_name" => "D" },
        ],
        vec!["email"],
    )
    .update_columns(["last_name"]);
    let sql_text = query.to_sql();

    assert!(sql_text.contains(r#"VALUES ($1, $2, $3), ($4, $5, DEFAULT)"#));
    assert!(sql_text.contains(r#"DO UPDATE SET "last_name" = EXCLUDED."last_name" RETURNING"#));
    assert_eq!(query.result_mode(), ResultMode::RowArray);

    assert_eq!(
        upsert_many("shop.user", Vec::new(), "email").to_sql(),
        r#"SELECT NULL::jsonb AS "result" WHERE false"#
    );
}

#[test]
fn upsert_requires_a_conflict_target() {
    let query = upsert("shop.user", record! { "email" => "a@b.c" }, Vec::<String>::new());
    assert!(matches!(query.compile(), Err(DbError::EmptyConflictTarget)));

    let empty_many = upsert_many("shop.user", Vec::new(), Vec::<String>::new());
    assert!(matches!(empty_many.compile(), Err(DbError::EmptyConflictTarget)));
}

#[test]
fn upsert_action_deserializes() {
    let action: UpsertAction = serde_json::from_value(json!("UPDATE")).unwrap();
    assert_eq!(action, UpsertAction::Update);
    assert_eq!(ACTION_PROPERTY, "$action");
}

// ==================== truncate ====================

#[test]
fn truncate_options() {
    let compiled = truncate("shop.order")
        .table("shop.order_item")
        .restart_identity()
        .cascade()
        .compile()
        .unwrap();
    assert_eq!(
        compiled.sql,
        r#"TRUNCATE "shop"."order", "shop"."order_item" RESTART IDENTITY CASCADE"#
    );
    assert_eq!(
        truncate("t").continue_identity().restrict().compile().unwrap().sql,
        r#"TRUNCATE "t" CONTINUE IDENTITY RESTRICT"#
    );
}

// ==================== schema validation ====================

#[test]
fn schema_rejects_unknown_identifiers() {
    let schema = shop_schema();

    let unknown_column = select("shop.user", whereable! { "nickname" => "x" });
    assert!(matches!(
        unknown_column.prepare(Some(&schema)),
        Err(DbError::UnknownColumn { .. })
    ));

    let unknown_table = select("shop.invoice", Whereable::all());
    assert!(matches!(
        unknown_table.prepare(Some(&schema)),
        Err(DbError::UnknownTable(_))
    ));

    let lateral_column = select("shop.user", Whereable::all()).lateral(
        "orders",
        select("shop.order", whereable! { "customer_id" => parent("id") }),
    );
    assert!(matches!(
        lateral_column.prepare(Some(&schema)),
        Err(DbError::UnknownColumn { .. })
    ));

    let valid = select("shop.user", whereable! { "first_name" => "Ann" })
        .lateral("orders", select("shop.order", whereable! { "user_id" => parent("id") }));
    assert!(valid.prepare(Some(&schema)).is_ok());
}

#[test]
fn schema_rejects_unknown_parent_columns() {
    let schema = shop_schema();

    let query = select("shop.order", Whereable::all()).lateral(
        "user",
        select_one("shop.user", whereable! { "id" => parent("no_such_col") }),
    );
    match query.prepare(Some(&schema)) {
        Err(DbError::UnknownColumn { table, column }) => {
            assert_eq!(table, "shop.order");
            assert_eq!(column, "no_such_col");
        }
        other => panic!("expected UnknownColumn, got {other:?}"),
    }
}

#[test]
fn schema_rejects_unknown_truncated_tables() {
    let schema = shop_schema();

    assert!(matches!(
        truncate("shop.order").table("shop.nope").compile_with(Some(&schema)),
        Err(DbError::UnknownTable(table)) if table == "shop.nope"
    ));
    assert_eq!(
        truncate("shop.order").compile_with(Some(&schema)).unwrap().sql,
        r#"TRUNCATE "shop"."order""#
    );
}

#[test]
fn generated_alias_never_shadows_an_enclosing_table() {
    let compiled = select("shop.user_1", Whereable::all())
        .lateral(
            "owner",
            select_one("shop.user", whereable! { "id" => parent("owner_id") }),
        )
        .compile()
        .unwrap();

    assert!(compiled.sql.contains(r#"FROM "shop"."user" AS "user_1_1""#));
    assert!(compiled.sql.contains(r#""user_1_1"."id" = "user_1"."owner_id""#));
    assert!(!compiled.sql.contains(r#""user_1"."id" = "user_1"."owner_id""#));
}

// ==================== execution ====================

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: i64,
    first_name: String,
}

#[tokio::test]
async fn fetch_all_deserializes_rows() {
    let exec = RecordingExecutor::returning(vec![
        json!({ "result": { "id": 1, "first_name": "Ann" } }),
        json!({ "result": { "id": 2, "first_name": "Bob" } }),
    ]);
    let users: Vec<User> = select("shop.user", whereable! { "id" => gt(0_i64) })
        .fetch_all(&exec)
        .await
        .unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[1].first_name, "Bob");
    let statements = exec.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0],
        (
            r#"SELECT to_jsonb("user".*) AS "result" FROM "shop"."user" AS "user" WHERE ("user"."id" > $1)"#
                .to_string(),
            1
        )
    );
}

#[tokio::test]
async fn fetch_one_reports_missing_rows() {
    let exec = RecordingExecutor::default();
    let err = select_one("shop.user", whereable! { "id" => 9_i64 })
        .fetch_one::<User>(&exec)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let missing: Option<User> = select_one("shop.user", Whereable::all())
        .fetch_opt(&exec)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn run_folds_lateral_rows() {
    let exec = RecordingExecutor::returning(vec![
        json!({ "$row": 1, "result": { "id": 1 }, "lateral_0$row": 2, "lateral_0": { "id": 11 } }),
        json!({ "$row": 1, "result": { "id": 1 }, "lateral_0$row": 1, "lateral_0": { "id": 10 } }),
        json!({ "$row": 2, "result": { "id": 2 }, "lateral_0$row": null, "lateral_0": null }),
    ]);
    let shaped = select("shop.user", Whereable::all())
        .lateral("orders", select("shop.order", whereable! { "user_id" => parent("id") }))
        .run(&exec)
        .await
        .unwrap();

    assert_eq!(
        shaped,
        Shaped::Rows(vec![
            json!({ "id": 1, "orders": [{ "id": 10 }, { "id": 11 }] }),
            json!({ "id": 2, "orders": [] }),
        ])
    );
}

#[tokio::test]
async fn run_validates_against_executor_schema_before_sending() {
    let exec = RecordingExecutor {
        schema: Some(shop_schema()),
        ..RecordingExecutor::default()
    };
    let err = select("shop.user", whereable! { "nickname" => "x" })
        .run(&exec)
        .await
        .unwrap_err();
    assert!(err.is_build_error());
    assert!(exec.statements().is_empty());
}

#[tokio::test]
async fn truncate_runs_without_rows() {
    let exec = RecordingExecutor::default();
    truncate("shop.order").cascade().run(&exec).await.unwrap();
    assert_eq!(
        exec.statements(),
        vec![(r#"TRUNCATE "shop"."order" CASCADE"#.to_string(), 0)]
    );
}

#[tokio::test]
async fn truncate_validates_against_executor_schema_before_sending() {
    let exec = RecordingExecutor {
        schema: Some(shop_schema()),
        ..RecordingExecutor::default()
    };
    let err = truncate("shop.nope").run(&exec).await.unwrap_err();
    assert!(err.is_build_error());
    assert!(exec.statements().is_empty());
}
