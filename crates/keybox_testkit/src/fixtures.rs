//! Test fixtures and harness helpers.
//!
//! Provides ready-made type models and a harness that wires a catalog,
//! committed schemas, a key registry and an object cache together.

use keybox_codec::{Value, ValueType};
use keybox_core::{
    Field, Instance, InstanceFactory, KeyBoxConfig, KeyBoxResult, KeyRegistry, KeyRing,
    KeySpec, ObjectCache, PropertyDescriptor, RecordFactory, SchemaRegistry, SchemaSet,
    TypeCatalog, TypeDescriptor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Factory that counts the instances it creates, per type.
#[derive(Debug)]
pub struct CountingFactory {
    inner: RecordFactory,
    created: parking_lot::Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl CountingFactory {
    /// Wraps a record factory.
    pub fn new(inner: RecordFactory) -> Self {
        Self {
            inner,
            created: parking_lot::Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
        }
    }

    /// Instances created for `type_name` (after binding resolution).
    pub fn created(&self, type_name: &str) -> usize {
        self.created.lock().get(type_name).copied().unwrap_or(0)
    }

    /// Instances created across all types.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl InstanceFactory for CountingFactory {
    fn create(&self, type_name: &str) -> KeyBoxResult<Instance> {
        let instance = self.inner.create(type_name)?;
        *self
            .created
            .lock()
            .entry(instance.type_name().to_string())
            .or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(instance)
    }
}

/// A catalog, committed schemas, a key registry and an object cache.
pub struct KeyBoxHarness {
    /// Type catalog shared by every component.
    pub catalog: Arc<TypeCatalog>,
    /// Committed schemas.
    pub schemas: Arc<SchemaSet>,
    /// Identity map over the schemas.
    pub registry: KeyRegistry,
    /// Value-keyed cache over the catalog.
    pub cache: ObjectCache,
    /// The registry's factory.
    pub factory: Arc<CountingFactory>,
}

impl KeyBoxHarness {
    /// Builds a harness with the default configuration.
    ///
    /// `declare` receives the schema registry before it is committed.
    pub fn build<F>(catalog: TypeCatalog, declare: F) -> KeyBoxResult<Self>
    where
        F: FnOnce(&mut SchemaRegistry) -> KeyBoxResult<()>,
    {
        Self::build_with(catalog, KeyBoxConfig::default(), |factory| factory, declare)
    }

    /// Builds a harness with a custom configuration and factory bindings.
    pub fn build_with<B, F>(
        catalog: TypeCatalog,
        config: KeyBoxConfig,
        bind: B,
        declare: F,
    ) -> KeyBoxResult<Self>
    where
        B: FnOnce(RecordFactory) -> RecordFactory,
        F: FnOnce(&mut SchemaRegistry) -> KeyBoxResult<()>,
    {
        let catalog = Arc::new(catalog);
        let mut schemas = SchemaRegistry::new(Arc::clone(&catalog));
        declare(&mut schemas)?;
        let schemas = schemas.commit()?;
        let factory = Arc::new(CountingFactory::new(bind(RecordFactory::new(Arc::clone(
            &catalog,
        )))));
        let registry = KeyRegistry::with_config(
            Arc::clone(&schemas),
            Arc::clone(&factory) as Arc<dyn InstanceFactory>,
            config,
        );
        Ok(Self {
            cache: ObjectCache::new(Arc::clone(&catalog)),
            catalog,
            schemas,
            registry,
            factory,
        })
    }

    /// Creates an instance through the registry's factory.
    pub fn create(&self, type_name: &str) -> Instance {
        self.registry
            .factory()
            .create(type_name)
            .expect("Failed to create instance")
    }

    /// Creates an instance and writes the given value fields.
    pub fn create_with(&self, type_name: &str, fields: &[(&str, Value)]) -> Instance {
        let instance = self.create(type_name);
        for (name, value) in fields {
            self.write(&instance, name, value.clone());
        }
        instance
    }

    /// The key ring of an instance whose type has a schema.
    pub fn ring(&self, instance: &Instance) -> Arc<KeyRing> {
        self.registry
            .key_ring_for(instance)
            .expect("Failed to resolve key ring")
            .expect("Type has no key schema")
    }

    /// A fresh instance-less ring for a declared type.
    pub fn unbound_ring(&self, type_name: &str) -> Arc<KeyRing> {
        self.registry
            .key_ring_for_type(type_name)
            .expect("Failed to resolve key ring")
            .expect("Type has no key schema")
    }

    /// Reads a value property; unset reads as null.
    pub fn read(&self, instance: &Instance, property: &str) -> Value {
        match self
            .catalog
            .read(instance.as_ref(), property)
            .expect("Failed to read property")
        {
            Field::Value(value) => value,
            Field::Object(_) => panic!("{property} is an object property"),
        }
    }

    /// Reads an object property.
    pub fn related(&self, instance: &Instance, property: &str) -> Option<Instance> {
        self.catalog
            .read(instance.as_ref(), property)
            .expect("Failed to read property")
            .as_object()
            .cloned()
    }

    /// Writes a value property.
    pub fn write(&self, instance: &Instance, property: &str, value: impl Into<Value>) {
        self.catalog
            .write(instance.as_ref(), property, Field::Value(value.into()))
            .expect("Failed to write property");
    }

    /// Writes an object property.
    pub fn link(&self, instance: &Instance, property: &str, related: &Instance) {
        self.catalog
            .write(instance.as_ref(), property, Field::from(Arc::clone(related)))
            .expect("Failed to write property");
    }
}

/// Simple keyed types.
///
/// - `Poco`: literal key `{ID: integer}`
/// - `CompositePoco`: literal key `{ID1: integer, ID2: text}`
/// - `RelatedPoco`: literal key `{Code: text}`
/// - `ForeignPoco`: key `{Code: "/Related/Code"}` delegating to `RelatedPoco`
/// - `NullablePoco`: a nullable `Related` property, for rejected paths
/// - `IPoco` / `InterfacePoco` / `AliasPoco`: interface and alias coverage
pub fn poco_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog
        .register_all([
            TypeDescriptor::interface("IPoco"),
            TypeDescriptor::class("Poco").value("Name", ValueType::Text),
            TypeDescriptor::class("CompositePoco").value("Note", ValueType::Text),
            TypeDescriptor::class("RelatedPoco").value("Label", ValueType::Text),
            TypeDescriptor::class("ForeignPoco").object("Related", "RelatedPoco"),
            TypeDescriptor::class("NullablePoco")
                .property(PropertyDescriptor::object("Related", "RelatedPoco").nullable()),
            TypeDescriptor::class("InterfacePoco")
                .implements("IPoco")
                .value("ID", ValueType::Integer)
                .value("Name", ValueType::Text),
            TypeDescriptor::class("AliasPoco").value("Name", ValueType::Text),
        ])
        .expect("Failed to register poco types");
    catalog
}

/// Declares the keys of [`poco_catalog`].
pub fn declare_poco_keys(schemas: &mut SchemaRegistry) -> KeyBoxResult<()> {
    schemas
        .declare_key("Poco", [("ID", ValueType::Integer)])?
        .declare_key(
            "CompositePoco",
            [("ID2", ValueType::Text), ("ID1", ValueType::Integer)],
        )?
        .declare_key("RelatedPoco", [("Code", ValueType::Text)])?
        .declare_key("ForeignPoco", [("Code", "/Related/Code")])?
        .declare_key("InterfacePoco", [("ID", "/ID")])?
        .declare_key_alias("AliasPoco", "Poco")?;
    Ok(())
}

/// Harness over [`poco_catalog`].
pub fn poco_harness() -> KeyBoxHarness {
    KeyBoxHarness::build(poco_catalog(), declare_poco_keys).expect("Failed to build poco harness")
}

/// An order graph.
///
/// - `Customer {Code, Name}` keyed by `/Code`
/// - `Order {Number, Customer, Notes}` keyed by `/Number` and
///   `/Customer/Code` (part `Client`), read through the customer
/// - `OrderLine {Order, Line, Quantity}` keyed by `/Line`, `/Order/Number`
///   and `/Order/Client`, a foreign key onto the order's `Client` part
/// - `Shipment {Carrier, Address}` keyed by `/Carrier` and `/Address/Zip`,
///   which crosses an object property
/// - `Address {City, Zip}` with no key
/// - `IParty` implemented by `Customer`
pub fn order_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog
        .register_all([
            TypeDescriptor::interface("IParty"),
            TypeDescriptor::class("Customer")
                .implements("IParty")
                .value("Code", ValueType::Text)
                .value("Name", ValueType::Text)
                .value("Rating", ValueType::Integer),
            TypeDescriptor::class("Order")
                .value("Number", ValueType::Integer)
                .object("Customer", "Customer")
                .value("Notes", ValueType::Text),
            TypeDescriptor::class("OrderLine")
                .object("Order", "Order")
                .value("Line", ValueType::Integer)
                .value("Quantity", ValueType::Integer),
            TypeDescriptor::class("Address")
                .value("City", ValueType::Text)
                .value("Zip", ValueType::Text),
            TypeDescriptor::class("Shipment")
                .value("Carrier", ValueType::Text)
                .object("Address", "Address"),
        ])
        .expect("Failed to register order types");
    catalog
}

/// Declares the keys of [`order_catalog`].
pub fn declare_order_keys(schemas: &mut SchemaRegistry) -> KeyBoxResult<()> {
    schemas
        .declare_key("Customer", [("Code", "/Code")])?
        .declare_key("Order", [("Client", "/Customer/Code"), ("Number", "/Number")])?
        .declare_key(
            "OrderLine",
            [
                ("Client", "/Order/Client"),
                ("Line", "/Line"),
                ("Number", "/Order/Number"),
            ],
        )?
        .declare_key(
            "Shipment",
            [
                ("Carrier", KeySpec::from("/Carrier")),
                ("Zip", KeySpec::from("/Address/Zip")),
            ],
        )?;
    Ok(())
}

/// Harness over [`order_catalog`].
pub fn order_harness() -> KeyBoxHarness {
    KeyBoxHarness::build(order_catalog(), declare_order_keys)
        .expect("Failed to build order harness")
}

/// Harness over [`order_catalog`] with a custom configuration.
pub fn order_harness_with(config: KeyBoxConfig) -> KeyBoxHarness {
    KeyBoxHarness::build_with(order_catalog(), config, |factory| factory, declare_order_keys)
        .expect("Failed to build order harness")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A customer with the given code and an order for it.
    pub fn customer_order(h: &KeyBoxHarness, code: &str, number: i64) -> (Instance, Instance) {
        let customer = h.create_with("Customer", &[("Code", code.into())]);
        let order = h.create_with("Order", &[("Number", Value::Integer(number))]);
        h.link(&order, "Customer", &customer);
        (customer, order)
    }

    /// `count` customers with codes `C0`, `C1`, ...
    pub fn customers(h: &KeyBoxHarness, count: usize) -> Vec<Instance> {
        (0..count)
            .map(|i| h.create_with("Customer", &[("Code", format!("C{i}").into())]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poco_harness() {
        let h = poco_harness();
        assert_eq!(h.schemas.len(), 6);
        let poco = h.create("Poco");
        assert_eq!(h.ring(&poco).part_count(), 1);
        assert_eq!(h.factory.created("Poco"), 1);
    }

    #[test]
    fn test_order_harness() {
        let h = order_harness();
        let (customer, order) = scenarios::customer_order(&h, "ACME", 7);
        assert_eq!(h.read(&customer, "Code"), Value::from("ACME"));
        assert!(h.related(&order, "Customer").is_some());
        assert_eq!(h.factory.total(), 2);
    }

    #[test]
    fn test_customers_scenario() {
        let h = order_harness();
        let customers = scenarios::customers(&h, 3);
        assert_eq!(h.read(&customers[2], "Code"), Value::from("C2"));
    }
}
