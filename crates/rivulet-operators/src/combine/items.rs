use rivulet_core::args::{ArgKind, ArgSpec, Args};
use rivulet_core::protocol::{shape, Shape};
use rivulet_core::{Context, Row, RowSink, RowStream, Scope, Value};

use crate::call::spawn_plugin;
use crate::traits::{OpError, OperatorInfo, Plugin};

pub const KEY_COLUMN: &str = "_key";
pub const VALUE_COLUMN: &str = "_value";

fn pair(key: impl Into<Value>, value: impl Into<Value>) -> Row {
    Row::new().with(KEY_COLUMN, key).with(VALUE_COLUMN, value)
}

/// Enumerate any value as `(_key, _value)` rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct Items;

impl Plugin for Items {
    fn info(&self) -> OperatorInfo {
        OperatorInfo::new(
            "items",
            "Enumerate a query, list, row or object as _key/_value rows.",
            vec![ArgSpec::required("item", ArgKind::Any, "Value to enumerate.")],
        )
    }

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream {
        spawn_plugin("items", ctx, scope, args, run)
    }
}

async fn run(ctx: Context, scope: Scope, args: Args, sink: RowSink) -> Result<(), OpError> {
    let item = args.required(&ctx, &scope, "item").await?;

    match shape(&item) {
        Shape::Stream(query) => {
            let mut rows = query.eval(&ctx, &scope);
            let mut index: i64 = 0;
            while let Some(row) = rows.next(&ctx).await {
                if !sink.send(&ctx, pair(index, row)).await {
                    break;
                }
                index += 1;
            }
        }
        Shape::Ordered(values) => {
            for (index, value) in values.into_iter().enumerate() {
                if !sink.send(&ctx, pair(index, value)).await {
                    break;
                }
            }
        }
        Shape::Fields(row) => {
            for (key, value) in row {
                if !sink.send(&ctx, pair(key, value)).await {
                    break;
                }
            }
        }
        Shape::Keyed(object) => {
            object.refresh(&ctx, &scope).await;
            for key in object.members() {
                let Some(value) = object.get(&ctx, &scope, &key).await else {
                    continue;
                };
                if !sink.send(&ctx, pair(key, value)).await {
                    break;
                }
            }
        }
        Shape::Scalar(_) => {}
    }
    Ok(())
}
