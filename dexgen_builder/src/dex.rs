//! Symbol interning and class/method composition.
//!
//! [`DexBuilder`] owns the build's symbol tables and the container sink.
//! Every interning operation is an idempotent get-or-create: a repeated key
//! returns the id assigned on first sight, a new key allocates the next id,
//! forwards the payload to the sink once, and records the mapping. Tables
//! are append-only for the life of the build.
//!
//! Sub-builders ([`ClassBuilder`], [`MethodBuilder`]) borrow the
//! `DexBuilder` as an explicit context for their own construction lifetime;
//! nothing here is shared through globals.

use crate::bytecode::MethodBuilder;
use crate::container::{ContainerSink, MethodCode};
use dexgen_core::{
    ClassIndex, MethodIndex, ProtoIndex, Prototype, StringIndex, TypeDescriptor, TypeIndex,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Declaration record for an interned method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDecl {
    /// The method's interned id.
    pub id: MethodIndex,
    /// The method's interned prototype.
    pub proto: ProtoIndex,
}

/// Full identity of a method: defining type, name, prototype.
///
/// Ordered so that identical declarations collapse to one id regardless of
/// where in the program they are first mentioned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MethodKey {
    class: TypeDescriptor,
    name: String,
    prototype: Prototype,
}

/// Top-level builder for one artifact.
///
/// The unit of shared mutable state for a build: every class, method,
/// string and type is created against one `DexBuilder` and must not outlive
/// it. Dropping the builder discards the build; [`DexBuilder::into_image`]
/// consumes it and delegates final assembly to the sink.
pub struct DexBuilder<S: ContainerSink> {
    sink: S,

    strings: FxHashMap<String, StringIndex>,
    types_by_descriptor: FxHashMap<String, TypeIndex>,
    protos: BTreeMap<Prototype, ProtoIndex>,
    methods: BTreeMap<MethodKey, MethodDecl>,
    classes: u32,
}

impl<S: ContainerSink> DexBuilder<S> {
    /// Create a builder that forwards to `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            strings: FxHashMap::default(),
            types_by_descriptor: FxHashMap::default(),
            protos: BTreeMap::new(),
            methods: BTreeMap::new(),
            classes: 0,
        }
    }

    // =========================================================================
    // Interning
    // =========================================================================

    /// Intern a string, returning the id assigned on first sight.
    pub fn get_or_add_string(&mut self, value: &str) -> StringIndex {
        if let Some(&id) = self.strings.get(value) {
            return id;
        }
        let id = StringIndex::new(self.strings.len() as u32);
        self.sink.declare_string(id, value);
        self.strings.insert(value.to_owned(), id);
        id
    }

    /// Intern a type by its descriptor. The descriptor string itself is
    /// interned as a string.
    pub fn get_or_add_type(&mut self, descriptor: &TypeDescriptor) -> TypeIndex {
        if let Some(&id) = self.types_by_descriptor.get(descriptor.descriptor()) {
            return id;
        }
        self.get_or_add_string(descriptor.descriptor());
        let id = TypeIndex::new(self.types_by_descriptor.len() as u32);
        self.sink.declare_type(id, descriptor.descriptor());
        self.types_by_descriptor
            .insert(descriptor.descriptor().to_owned(), id);
        id
    }

    /// Intern a prototype, interning its shorty and component types with it.
    fn get_or_add_proto(&mut self, prototype: &Prototype) -> ProtoIndex {
        if let Some(&id) = self.protos.get(prototype) {
            return id;
        }
        let shorty = prototype.shorty();
        self.get_or_add_string(&shorty);
        self.get_or_add_type(prototype.return_type());
        for param in prototype.param_types() {
            self.get_or_add_type(param);
        }

        let id = ProtoIndex::new(self.protos.len() as u32);
        let param_descriptors: SmallVec<[&str; 4]> = prototype
            .param_types()
            .iter()
            .map(|t| t.descriptor())
            .collect();
        self.sink.declare_proto(
            id,
            &shorty,
            prototype.return_type().descriptor(),
            &param_descriptors,
        );
        self.protos.insert(prototype.clone(), id);
        id
    }

    /// Intern a method declaration, keyed by (defining type, name,
    /// prototype). Usable for imported methods as well as ones defined in
    /// this build.
    pub fn get_or_declare_method(
        &mut self,
        class: TypeDescriptor,
        name: &str,
        prototype: Prototype,
    ) -> MethodDecl {
        let key = MethodKey {
            class,
            name: name.to_owned(),
            prototype,
        };
        if let Some(&decl) = self.methods.get(&key) {
            return decl;
        }

        let proto = self.get_or_add_proto(&key.prototype);
        self.get_or_add_type(&key.class);
        self.get_or_add_string(&key.name);

        let id = MethodIndex::new(self.methods.len() as u32);
        self.sink
            .declare_method(id, key.class.descriptor(), &key.name, proto);
        let decl = MethodDecl { id, proto };
        self.methods.insert(key, decl);
        decl
    }

    // =========================================================================
    // Symbol lookups used by the encode pass
    // =========================================================================

    /// Number of interned strings.
    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    /// Number of interned types.
    pub fn type_count(&self) -> usize {
        self.types_by_descriptor.len()
    }

    /// Number of interned prototypes.
    pub fn proto_count(&self) -> usize {
        self.protos.len()
    }

    /// Number of declared methods.
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Was this string id assigned by this builder?
    pub fn has_string(&self, id: StringIndex) -> bool {
        (id.index() as usize) < self.strings.len()
    }

    /// Was this type id assigned by this builder?
    pub fn has_type(&self, id: TypeIndex) -> bool {
        (id.index() as usize) < self.types_by_descriptor.len()
    }

    /// Was this method id assigned by this builder?
    pub fn has_method(&self, id: MethodIndex) -> bool {
        (id.index() as usize) < self.methods.len()
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Start a class definition, interning its type. The superclass is
    /// `java.lang.Object`.
    pub fn make_class(&mut self, name: &str) -> ClassBuilder<'_, S> {
        let descriptor = TypeDescriptor::from_classname(name);
        self.get_or_add_type(&descriptor);
        let superclass = TypeDescriptor::object();
        self.get_or_add_type(&superclass);

        let id = ClassIndex::new(self.classes);
        self.classes += 1;
        self.sink
            .begin_class(id, descriptor.descriptor(), superclass.descriptor());
        ClassBuilder {
            dex: self,
            id,
            descriptor,
        }
    }

    /// Produce the final in-memory image, consuming the builder.
    ///
    /// All ordering and offset fix-up happens inside the sink; the ids
    /// assigned during the build are not assumed to survive into the image.
    pub fn into_image(self) -> Vec<u8> {
        self.sink.finish()
    }

    /// The sink, for inspection.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub(crate) fn attach_code(&mut self, class: ClassIndex, method: MethodIndex, code: MethodCode) {
        self.sink.define_method(class, method, code);
    }

    pub(crate) fn set_source_file(&mut self, class: ClassIndex, file: &str) {
        self.get_or_add_string(file);
        self.sink.set_source_file(class, file);
    }
}

/// Builder for one class definition.
///
/// Holds a non-owning borrow of the shared [`DexBuilder`] context for its
/// own construction lifetime.
pub struct ClassBuilder<'a, S: ContainerSink> {
    dex: &'a mut DexBuilder<S>,
    id: ClassIndex,
    descriptor: TypeDescriptor,
}

impl<'a, S: ContainerSink> ClassBuilder<'a, S> {
    /// The class's interned descriptor.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Record the source-file name for this class.
    pub fn set_source_file(&mut self, file: &str) {
        self.dex.set_source_file(self.id, file);
    }

    /// Declare a method on this class and return a builder for its body.
    pub fn create_method(&mut self, name: &str, prototype: Prototype) -> MethodBuilder<'_, S> {
        let ins = prototype.param_types().len() as u16;
        let decl = self
            .dex
            .get_or_declare_method(self.descriptor.clone(), name, prototype);
        MethodBuilder::new(self.dex, self.id, decl, ins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::RecordingSink;

    #[test]
    fn test_string_interning_is_idempotent() {
        let mut dex = DexBuilder::new(RecordingSink::default());
        let a = dex.get_or_add_string("hello");
        let len_after_first = dex.string_count();
        let b = dex.get_or_add_string("hello");
        assert_eq!(a, b);
        assert_eq!(dex.string_count(), len_after_first);
        assert_eq!(dex.sink().strings.len(), 1);
    }

    #[test]
    fn test_type_interning_is_idempotent() {
        let mut dex = DexBuilder::new(RecordingSink::default());
        let a = dex.get_or_add_type(&TypeDescriptor::int());
        assert_eq!(dex.type_count(), 1);
        let b = dex.get_or_add_type(&TypeDescriptor::int());
        assert_eq!(a, b);
        assert_eq!(dex.type_count(), 1);
        let c = dex.get_or_add_type(&TypeDescriptor::void());
        assert_ne!(a, c);
        assert_eq!(dex.type_count(), 2);
    }

    #[test]
    fn test_type_interning_declares_descriptor_string() {
        let mut dex = DexBuilder::new(RecordingSink::default());
        dex.get_or_add_type(&TypeDescriptor::from_classname("a.B"));
        assert!(dex
            .sink()
            .strings
            .iter()
            .any(|(_, s)| s == "La/B;"));
    }

    #[test]
    fn test_method_interning_collapses_identical_declarations() {
        let mut dex = DexBuilder::new(RecordingSink::default());
        let proto = Prototype::new(TypeDescriptor::void(), [TypeDescriptor::int()]);
        let a = dex.get_or_declare_method(TypeDescriptor::object(), "wait", proto.clone());
        let b = dex.get_or_declare_method(TypeDescriptor::object(), "wait", proto.clone());
        assert_eq!(a, b);
        assert_eq!(dex.method_count(), 1);
        assert_eq!(dex.sink().methods.len(), 1);

        // different name on the same type is a new declaration
        let c = dex.get_or_declare_method(TypeDescriptor::object(), "notify", proto);
        assert_ne!(a.id, c.id);
        assert_eq!(dex.method_count(), 2);
    }

    #[test]
    fn test_proto_interning_shares_across_methods() {
        let mut dex = DexBuilder::new(RecordingSink::default());
        let proto = Prototype::new(TypeDescriptor::void(), []);
        let a = dex.get_or_declare_method(TypeDescriptor::object(), "a", proto.clone());
        let b = dex.get_or_declare_method(TypeDescriptor::object(), "b", proto);
        assert_eq!(a.proto, b.proto);
        assert_eq!(dex.proto_count(), 1);
        assert_eq!(dex.sink().protos, vec![(ProtoIndex::new(0), "V".to_owned())]);
    }

    #[test]
    fn test_make_class_interns_class_and_superclass() {
        let mut dex = DexBuilder::new(RecordingSink::default());
        let class = dex.make_class("com.example.Widget");
        assert_eq!(class.descriptor().descriptor(), "Lcom/example/Widget;");
        drop(class);
        assert!(dex.has_type(TypeIndex::new(0)));
        assert!(dex.has_type(TypeIndex::new(1)));
        assert_eq!(
            dex.sink().classes,
            vec![(ClassIndex::new(0), "Lcom/example/Widget;".to_owned())]
        );
    }

    #[test]
    fn test_source_file_is_interned_and_forwarded() {
        let mut dex = DexBuilder::new(RecordingSink::default());
        let mut class = dex.make_class("a.B");
        class.set_source_file("B.java");
        drop(class);
        assert!(dex.sink().strings.iter().any(|(_, s)| s == "B.java"));
        assert_eq!(dex.sink().source_files.len(), 1);
    }

    #[test]
    fn test_into_image_consumes_builder() {
        let dex = DexBuilder::new(RecordingSink::default());
        let image = dex.into_image();
        assert!(image.is_empty());
    }
}
