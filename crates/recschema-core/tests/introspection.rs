//! Integration test: describe record graphs and move values through the
//! structural codec without any schema validation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use recschema_core::encoder::DecimalEncoder;
use recschema_core::{
    literal_enum, union_enum, Catalog, ConvertError, DecodeContext, DecodeOptions, EncodeContext,
    EncodeOptions, FieldEncoder, FieldReader, FieldWriter, Primitive, Record,
    SchemaGenerationError, TypeBuilder, TypeSignature,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};

// ── Fixtures ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

impl Record for Point {
    const NAME: &'static str = "Point";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.field::<f64>("x")?;
        t.field::<f64>("y")?;
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("x", &self.x)?.field("y", &self.y)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            x: r.field("x")?,
            y: r.field("y")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl Record for TreeNode {
    const NAME: &'static str = "TreeNode";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.field::<String>("label")?;
        t.field::<Vec<TreeNode>>("children")?.default_value(json!([]));
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("label", &self.label)?
            .field("children", &self.children)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            label: r.field("label")?,
            children: r.field("children")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Circle {
    radius: f64,
}

impl Record for Circle {
    const NAME: &'static str = "Circle";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.tag("kind", "circle")?;
        t.field::<f64>("radius")?.minimum(0.0);
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("radius", &self.radius)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            radius: r.field("radius")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Square {
    side: f64,
}

impl Record for Square {
    const NAME: &'static str = "Square";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.tag("kind", "square")?;
        t.field::<f64>("side")?;
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("side", &self.side)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            side: r.field("side")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Circle(Circle),
    Square(Square),
}

impl Record for Shape {
    const NAME: &'static str = "Shape";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.discriminator("kind")
            .variant::<Circle>()
            .variant::<Square>();
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        match self {
            Shape::Circle(c) => w.variant(c),
            Shape::Square(s) => w.variant(s),
        }
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        match r.variant() {
            "Circle" => r.read_variant().map(Shape::Circle),
            "Square" => r.read_variant().map(Shape::Square),
            _ => Err(r.unknown_variant()),
        }
    }
}

/// Two variants claiming the same discriminator value.
struct Clash;
struct Oval;

impl Record for Oval {
    const NAME: &'static str = "Oval";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.tag("kind", "circle")?;
        Ok(())
    }

    fn write_fields(&self, _w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        Ok(())
    }

    fn read_fields(_r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Oval)
    }
}

impl Record for Clash {
    const NAME: &'static str = "Clash";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.discriminator("kind").variant::<Circle>().variant::<Oval>();
        Ok(())
    }

    fn write_fields(&self, _w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        Ok(())
    }

    fn read_fields(_r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Clash)
    }
}

/// A variant that never declares its discriminator value.
struct Untagged;
struct Loose;

impl Record for Loose {
    const NAME: &'static str = "Loose";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.field::<String>("kind")?;
        Ok(())
    }

    fn write_fields(&self, _w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        Ok(())
    }

    fn read_fields(_r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Loose)
    }
}

impl Record for Untagged {
    const NAME: &'static str = "Untagged";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.discriminator("kind").variant::<Loose>();
        Ok(())
    }

    fn write_fields(&self, _w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        Ok(())
    }

    fn read_fields(_r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Untagged)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Product {
    name: String,
    cost: f64,
    note: Option<String>,
}

impl Record for Product {
    const NAME: &'static str = "Product";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.description("Something for sale");
        t.field::<String>("name")?.min_length(1);
        t.field::<f64>("cost")?.default(20.0)?;
        t.field::<Option<String>>("note")?.rename("remark");
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("name", &self.name)?
            .field("cost", &self.cost)?
            .field("note", &self.note)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            name: r.field("name")?,
            cost: r.field("cost")?,
            note: r.field("note")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Order {
    items: Vec<Product>,
    tags: BTreeMap<String, i64>,
}

impl Record for Order {
    const NAME: &'static str = "Order";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.field::<Vec<Product>>("items")?;
        t.field::<BTreeMap<String, i64>>("tags")?;
        t.deny_unknown_fields();
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("items", &self.items)?.field("tags", &self.tags)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            items: r.field("items")?,
            tags: r.field("tags")?,
        })
    }
}

/// Opaque domain scalar without a built-in encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cents(i64);

recschema_core::custom_field!(Cents);

struct CentsEncoder;

impl FieldEncoder<Cents> for CentsEncoder {
    fn to_wire(&self, value: &Cents) -> Value {
        json!(format!("{}.{:02}", value.0 / 100, value.0 % 100))
    }

    fn to_native(&self, value: &Value) -> Result<Cents, String> {
        let text = value.as_str().ok_or("expected a string")?;
        let (whole, frac) = text.split_once('.').ok_or("expected a decimal point")?;
        let whole: i64 = whole.parse().map_err(|_| "bad amount".to_string())?;
        let frac: i64 = frac.parse().map_err(|_| "bad amount".to_string())?;
        Ok(Cents(whole * 100 + frac))
    }

    fn json_schema(&self) -> Value {
        json!({"type": "string", "pattern": "^[0-9]+\\.[0-9]{2}$"})
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Invoice {
    total: Cents,
    issued: DateTime<Utc>,
}

impl Record for Invoice {
    const NAME: &'static str = "Invoice";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.field::<Cents>("total")?;
        t.field::<DateTime<Utc>>("issued")?;
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("total", &self.total)?.field("issued", &self.issued)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            total: r.field("total")?,
            issued: r.field("issued")?,
        })
    }
}

struct Left;
struct Right;

impl Record for Left {
    const NAME: &'static str = "Left";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.base::<Right>()?;
        Ok(())
    }

    fn write_fields(&self, _w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        Ok(())
    }

    fn read_fields(_r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Left)
    }
}

impl Record for Right {
    const NAME: &'static str = "Right";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.base::<Left>()?;
        Ok(())
    }

    fn write_fields(&self, _w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        Ok(())
    }

    fn read_fields(_r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Right)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Audited {
    id: i64,
    name: String,
}

impl Record for Audited {
    const NAME: &'static str = "Audited";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.field::<i64>("id")?;
        t.field::<String>("name")?;
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("id", &self.id)?.field("name", &self.name)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            id: r.field("id")?,
            name: r.field("name")?,
        })
    }
}

literal_enum! {
    /// Account tier.
    enum Tier {
        Free => "free",
        Pro => "pro",
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Account {
    id: i64,
    name: Option<String>,
    tier: Tier,
}

impl Record for Account {
    const NAME: &'static str = "Account";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.base::<Audited>()?;
        t.field::<Option<String>>("name")?;
        t.field::<Tier>("tier")?.default(Tier::Free)?;
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("id", &self.id)?
            .field("name", &self.name)?
            .field("tier", &self.tier)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            id: r.field("id")?,
            name: r.field("name")?,
            tier: r.field("tier")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Ledger {
    booked: NaiveDate,
    balance: Decimal,
}

impl Record for Ledger {
    const NAME: &'static str = "Ledger";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.field::<NaiveDate>("booked")?;
        t.field::<Decimal>("balance")?;
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("booked", &self.booked)?.field("balance", &self.balance)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self {
            booked: r.field("booked")?,
            balance: r.field("balance")?,
        })
    }
}

union_enum! {
    #[derive(Debug, Clone, PartialEq)]
    enum Reading {
        Whole(i64),
        Fraction(f64),
        Text(String),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Sensor {
    last: Reading,
}

impl Record for Sensor {
    const NAME: &'static str = "Sensor";

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        t.field::<Reading>("last")?;
        Ok(())
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        w.field("last", &self.last)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        Ok(Self { last: r.field("last")? })
    }
}

fn encode<R: Record>(catalog: &Catalog, value: &R, options: EncodeOptions) -> Result<Value, ConvertError> {
    EncodeContext::new(catalog, options).encode(value)
}

fn decode<R: Record>(catalog: &Catalog, value: &Value) -> Result<R, ConvertError> {
    DecodeContext::new(catalog, DecodeOptions::default()).decode(value)
}

// ── Introspection ────────────────────────────────────────────────────

#[test]
fn describes_fields_in_declaration_order() {
    let catalog = Catalog::new();
    let desc = catalog.describe::<Point>().unwrap();
    let names: Vec<_> = desc.fields.iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["x", "y"]);
    assert_eq!(desc.required_fields(), vec!["x", "y"]);
    assert_eq!(
        desc.fields[0].signature,
        TypeSignature::Primitive(Primitive::Number)
    );
}

#[test]
fn describe_is_memoized() {
    let catalog = Catalog::new();
    let first = catalog.describe::<Point>().unwrap();
    let second = catalog.describe::<Point>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn recursive_record_resolves_to_reference() {
    let catalog = Catalog::new();
    let desc = catalog.describe::<TreeNode>().unwrap();
    let children = desc.field("children").unwrap();
    assert_eq!(
        children.signature,
        TypeSignature::Sequence(Box::new(TypeSignature::Record(TreeNode::type_key())))
    );
    assert!(!children.required);
}

#[test]
fn discriminated_base_records_variants() {
    let catalog = Catalog::new();
    let desc = catalog.describe::<Shape>().unwrap();
    assert!(desc.is_abstract());
    let values: Vec<_> = desc.variants.iter().map(|v| v.value.clone()).collect();
    assert_eq!(values, vec![json!("circle"), json!("square")]);
    assert!(catalog.descriptor(&Circle::type_key()).is_some());
}

#[test]
fn discriminator_collision_commits_nothing() {
    let catalog = Catalog::new();
    let err = catalog.describe::<Clash>().unwrap_err();
    assert!(matches!(
        err,
        SchemaGenerationError::DiscriminatorCollision { first: "Circle", second: "Oval", .. }
    ));
    assert!(catalog.types().is_empty());
}

#[test]
fn variant_without_literal_discriminator_fails() {
    let catalog = Catalog::new();
    let err = catalog.describe::<Untagged>().unwrap_err();
    assert!(matches!(
        err,
        SchemaGenerationError::MissingDiscriminator { variant: "Loose", .. }
    ));
}

#[test]
fn cyclic_inheritance_is_rejected() {
    let catalog = Catalog::new();
    let err = catalog.describe::<Left>().unwrap_err();
    assert!(matches!(err, SchemaGenerationError::CyclicInheritance { .. }));
    assert!(catalog.types().is_empty());
}

#[test]
fn inherited_fields_come_first_and_overrides_replace_in_place() {
    let catalog = Catalog::new();
    let desc = catalog.describe::<Account>().unwrap();
    let names: Vec<_> = desc.fields.iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["id", "name", "tier"]);
    assert_eq!(desc.required_fields(), vec!["id"]);
    assert_eq!(desc.field("tier").unwrap().default, Some(json!("free")));
    assert_eq!(desc.bases, vec![Audited::type_key()]);
}

#[test]
fn unregistered_scalar_fails_until_encoder_registered() {
    let catalog = Catalog::new();
    let err = catalog.describe::<Invoice>().unwrap_err();
    assert!(matches!(err, SchemaGenerationError::NoEncoder { .. }));

    catalog.register_encoder::<Cents, _>(CentsEncoder);
    let desc = catalog.describe::<Invoice>().unwrap();
    assert!(matches!(desc.field("total").unwrap().signature, TypeSignature::Custom(_)));
    assert!(matches!(desc.field("issued").unwrap().signature, TypeSignature::Custom(_)));
}

#[test]
fn registration_invalidates_descriptors() {
    let catalog = Catalog::new();
    let before = catalog.describe::<Point>().unwrap();
    catalog.register_encoder::<Cents, _>(CentsEncoder);
    let after = catalog.describe::<Point>().unwrap();
    assert!(after.encoder_version > before.encoder_version);
    assert_eq!(after.encoder_version, catalog.encoders().version());
}

#[test]
fn concurrent_describe_agrees() {
    let catalog = Arc::new(Catalog::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            thread::spawn(move || catalog.describe::<Shape>().map(|d| d.variants.len()))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 2);
    }
    assert_eq!(catalog.descriptors().unwrap().len(), 3);
}

#[test]
fn listing_rebuilds_stale_descriptors() {
    let catalog = Catalog::new();
    catalog.describe::<Shape>().unwrap();
    catalog.register_encoder::<Cents, _>(CentsEncoder);
    let version = catalog.encoders().version();
    let all = catalog.descriptors().unwrap();
    let names: Vec<_> = all.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["Circle", "Shape", "Square"]);
    assert!(all.iter().all(|d| d.encoder_version == version));
}

// ── Codec ────────────────────────────────────────────────────────────

#[test]
fn encode_fills_tags_and_follows_variants() {
    let catalog = Catalog::new();
    let shape = Shape::Circle(Circle { radius: 1.5 });
    let value = encode(&catalog, &shape, EncodeOptions::default()).unwrap();
    assert_eq!(value, json!({"kind": "circle", "radius": 1.5}));
    assert_eq!(decode::<Shape>(&catalog, &value).unwrap(), shape);
}

#[test]
fn decode_dispatches_on_discriminator() {
    let catalog = Catalog::new();
    let shape: Shape = decode(&catalog, &json!({"kind": "square", "side": 2.0})).unwrap();
    assert_eq!(shape, Shape::Square(Square { side: 2.0 }));
}

#[test]
fn unknown_or_missing_discriminator_reports_its_path() {
    let catalog = Catalog::new();
    let err = decode::<Shape>(&catalog, &json!({"kind": "triangle"})).unwrap_err();
    assert_eq!(err.path(), Some("kind"));
    let err = decode::<Shape>(&catalog, &json!({"side": 2.0})).unwrap_err();
    assert_eq!(err.path(), Some("kind"));
}

#[test]
fn defaults_and_nullables_fill_absent_fields() {
    let catalog = Catalog::new();
    let product: Product = decode(&catalog, &json!({"name": "pen"})).unwrap();
    assert_eq!(
        product,
        Product {
            name: "pen".into(),
            cost: 20.0,
            note: None
        }
    );
    let err = decode::<Product>(&catalog, &json!({"cost": 1.0})).unwrap_err();
    assert_eq!(err.path(), Some("name"));
}

#[test]
fn encode_uses_wire_names_and_omission_rules() {
    let catalog = Catalog::new();
    let product = Product {
        name: "pen".into(),
        cost: 20.0,
        note: Some("blue".into()),
    };
    let value = encode(&catalog, &product, EncodeOptions::default()).unwrap();
    assert_eq!(value, json!({"name": "pen", "cost": 20.0, "remark": "blue"}));

    let bare = Product { note: None, ..product };
    let value = encode(
        &catalog,
        &bare,
        EncodeOptions {
            omit_none: true,
            omit_defaults: true,
        },
    )
    .unwrap();
    assert_eq!(value, json!({"name": "pen"}));

    let value = encode(
        &catalog,
        &bare,
        EncodeOptions {
            omit_none: false,
            omit_defaults: false,
        },
    )
    .unwrap();
    assert_eq!(value, json!({"name": "pen", "cost": 20.0, "remark": null}));
}

#[test]
fn nested_decode_error_carries_full_path() {
    let catalog = Catalog::new();
    let value = json!({
        "items": [{"name": "pen"}, {"name": 7}],
        "tags": {}
    });
    let err = decode::<Order>(&catalog, &value).unwrap_err();
    assert_eq!(err.path(), Some("items[1].name"));
}

#[test]
fn denied_unknown_fields_are_rejected() {
    let catalog = Catalog::new();
    let value = json!({"items": [], "tags": {"a": 1}, "extra": true});
    let err = decode::<Order>(&catalog, &value).unwrap_err();
    assert_eq!(err.path(), Some("extra"));

    let strict = DecodeOptions { strict: true };
    let err = DecodeContext::new(&catalog, strict)
        .decode::<Point>(&json!({"x": 1.0, "y": 2.0, "z": 3.0}))
        .unwrap_err();
    assert_eq!(err.path(), Some("z"));
}

#[test]
fn registered_encoders_convert_scalars() {
    let catalog = Catalog::new();
    catalog.register_encoder::<Cents, _>(CentsEncoder);
    let invoice = Invoice {
        total: Cents(1250),
        issued: Utc.with_ymd_and_hms(2018, 6, 3, 12, 0, 0).unwrap(),
    };
    let value = encode(&catalog, &invoice, EncodeOptions::default()).unwrap();
    assert_eq!(value, json!({"total": "12.50", "issued": "2018-06-03T12:00:00Z"}));
    assert_eq!(decode::<Invoice>(&catalog, &value).unwrap(), invoice);

    let err = decode::<Invoice>(&catalog, &json!({"total": 12, "issued": "2018-06-03T12:00:00Z"}))
        .unwrap_err();
    assert_eq!(err.path(), Some("total"));
}

#[test]
fn literal_enums_round_trip() {
    let catalog = Catalog::new();
    let account = Account {
        id: 7,
        name: None,
        tier: Tier::Pro,
    };
    let value = encode(&catalog, &account, EncodeOptions::default()).unwrap();
    assert_eq!(value, json!({"id": 7, "tier": "pro"}));
    assert_eq!(decode::<Account>(&catalog, &value).unwrap(), account);

    let err = decode::<Account>(&catalog, &json!({"id": 7, "tier": "gold"})).unwrap_err();
    assert_eq!(err.path(), Some("tier"));
}

#[test]
fn recursive_values_round_trip() {
    let catalog = Catalog::new();
    let tree = TreeNode {
        label: "root".into(),
        children: vec![TreeNode {
            label: "leaf".into(),
            children: vec![],
        }],
    };
    let value = encode(&catalog, &tree, EncodeOptions::default()).unwrap();
    assert_eq!(value["children"][0]["label"], json!("leaf"));
    assert_eq!(decode::<TreeNode>(&catalog, &value).unwrap(), tree);
    let bare: TreeNode = decode(&catalog, &json!({"label": "solo"})).unwrap();
    assert!(bare.children.is_empty());
}

#[test]
fn dates_and_decimals_use_builtin_encoders() {
    let catalog = Catalog::new();
    let desc = catalog.describe::<Ledger>().unwrap();
    assert!(matches!(desc.fields[0].signature, TypeSignature::Custom(_)));
    assert!(matches!(desc.fields[1].signature, TypeSignature::Custom(_)));

    let ledger = Ledger {
        booked: NaiveDate::from_ymd_opt(2018, 6, 3).unwrap(),
        balance: Decimal::new(-4050, 2),
    };
    let value = encode(&catalog, &ledger, EncodeOptions::default()).unwrap();
    assert_eq!(value, json!({"booked": "2018-06-03", "balance": -40.5}));
    assert_eq!(decode::<Ledger>(&catalog, &value).unwrap(), ledger);

    let err = decode::<Ledger>(&catalog, &json!({"booked": "June", "balance": 1})).unwrap_err();
    assert_eq!(err.path(), Some("booked"));
}

#[test]
fn decimal_precision_is_reregistrable() {
    let catalog = Catalog::new();
    catalog.register_encoder::<Decimal, _>(DecimalEncoder::with_precision(3));
    let bundle = catalog
        .encoders()
        .get(std::any::TypeId::of::<Decimal>())
        .unwrap();
    assert_eq!(bundle.json_schema(), json!({"type": "number", "multipleOf": 0.001}));
}

#[test]
fn union_signature_lists_members() {
    let catalog = Catalog::new();
    let desc = catalog.describe::<Sensor>().unwrap();
    assert_eq!(
        desc.fields[0].signature,
        TypeSignature::Union(vec![
            TypeSignature::Primitive(Primitive::Integer),
            TypeSignature::Primitive(Primitive::Number),
            TypeSignature::Primitive(Primitive::String),
        ])
    );
}

#[test]
fn union_members_keep_their_number_kind() {
    let catalog = Catalog::new();
    for last in [
        Reading::Whole(3),
        Reading::Fraction(3.0),
        Reading::Fraction(-0.5),
        Reading::Text("3".to_string()),
    ] {
        let sensor = Sensor { last };
        let value = encode(&catalog, &sensor, EncodeOptions::default()).unwrap();
        assert_eq!(decode::<Sensor>(&catalog, &value).unwrap(), sensor);
    }
    // An integral number from outside still lands on the integer member.
    let sensor: Sensor = decode(&catalog, &json!({"last": 7})).unwrap();
    assert_eq!(sensor.last, Reading::Whole(7));

    let err = decode::<Sensor>(&catalog, &json!({"last": null})).unwrap_err();
    assert_eq!(err.path(), Some("last"));
}
