//! Boundary to the external container layer.
//!
//! The builder interns symbols and encodes method bodies; assembling those
//! pieces into the final container binary - structural sorting, offset
//! fix-up, on-disk layout - belongs to a separate writer behind the
//! [`ContainerSink`] trait. The builder forwards every interned payload on
//! first sight and every finished method body once, then delegates image
//! production to the sink.
//!
//! A sink owns whatever it keeps of the payloads it is handed; the ids it
//! receives stay valid until [`ContainerSink::finish`] consumes it. Ids
//! reflect the builder's first-sight order, and a sink is free to re-sort
//! entries while assembling the image.

use dexgen_core::{ClassIndex, MethodIndex, ProtoIndex, StringIndex, TypeIndex};

/// A fully encoded method body, ready for container assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCode {
    /// Total frame registers: locals plus incoming parameters.
    pub registers: u16,
    /// Incoming parameter registers.
    pub ins: u16,
    /// Temporary argument registers reserved for the most argument-heavy
    /// call in the body.
    pub outs: u16,
    /// The instruction stream, in 16-bit code units.
    pub units: Vec<u16>,
}

/// Receiver for everything the builder produces.
///
/// Implementations perform their own ordering and offset fix-up when
/// producing the image; the builder guarantees only that each declaration
/// arrives exactly once and that `define_method` follows the declarations
/// it refers to.
pub trait ContainerSink {
    /// Record an interned string.
    fn declare_string(&mut self, id: StringIndex, value: &str);

    /// Record an interned type by its descriptor.
    fn declare_type(&mut self, id: TypeIndex, descriptor: &str);

    /// Record an interned prototype.
    fn declare_proto(
        &mut self,
        id: ProtoIndex,
        shorty: &str,
        return_type: &str,
        param_types: &[&str],
    );

    /// Record a method declaration against its defining class descriptor.
    fn declare_method(&mut self, id: MethodIndex, class: &str, name: &str, proto: ProtoIndex);

    /// Open a class definition.
    fn begin_class(&mut self, id: ClassIndex, descriptor: &str, super_descriptor: &str);

    /// Attach a source-file name to a class.
    fn set_source_file(&mut self, class: ClassIndex, file: &str);

    /// Attach an encoded body to a declared method.
    fn define_method(&mut self, class: ClassIndex, method: MethodIndex, code: MethodCode);

    /// Assemble and return the final in-memory image.
    fn finish(self) -> Vec<u8>
    where
        Self: Sized;
}

/// Capture-only sink for tests and tooling.
///
/// Records every call verbatim, performs no ordering or fix-up, and
/// produces an empty image. Not a container implementation.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub strings: Vec<(StringIndex, String)>,
    pub types: Vec<(TypeIndex, String)>,
    pub protos: Vec<(ProtoIndex, String)>,
    pub methods: Vec<(MethodIndex, String, String)>,
    pub classes: Vec<(ClassIndex, String)>,
    pub source_files: Vec<(ClassIndex, String)>,
    pub code: Vec<(ClassIndex, MethodIndex, MethodCode)>,
}

impl ContainerSink for RecordingSink {
    fn declare_string(&mut self, id: StringIndex, value: &str) {
        self.strings.push((id, value.to_owned()));
    }

    fn declare_type(&mut self, id: TypeIndex, descriptor: &str) {
        self.types.push((id, descriptor.to_owned()));
    }

    fn declare_proto(
        &mut self,
        id: ProtoIndex,
        shorty: &str,
        _return_type: &str,
        _param_types: &[&str],
    ) {
        self.protos.push((id, shorty.to_owned()));
    }

    fn declare_method(&mut self, id: MethodIndex, class: &str, name: &str, _proto: ProtoIndex) {
        self.methods.push((id, class.to_owned(), name.to_owned()));
    }

    fn begin_class(&mut self, id: ClassIndex, descriptor: &str, _super_descriptor: &str) {
        self.classes.push((id, descriptor.to_owned()));
    }

    fn set_source_file(&mut self, class: ClassIndex, file: &str) {
        self.source_files.push((class, file.to_owned()));
    }

    fn define_method(&mut self, class: ClassIndex, method: MethodIndex, code: MethodCode) {
        self.code.push((class, method, code));
    }

    fn finish(self) -> Vec<u8> {
        Vec::new()
    }
}
