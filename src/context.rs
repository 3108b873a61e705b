use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::content::{Content, Operation};
use crate::object::{Dictionary, Object, ObjectId, ObjectKind, Stream};
use crate::xref::Xref;
use crate::{filters, Error, Result};

/// The owning store of one document's indirect-object graph.
///
/// A context is created per parsed or built document, mutated throughout an
/// editing session, and consumed read-only by the writer. References handed
/// out by [`Context::next_ref`] are unique and strictly increasing for the
/// lifetime of the context; deleting an object never recycles its number.
pub struct Context {
    /// The version of the PDF specification to which the file conforms.
    pub version: String,
    /// Bytes of the binary comment emitted after the header line.
    pub binary_mark: Vec<u8>,
    /// Trailer metadata: `Root`, `Encrypt`, `Info` and `ID` entries, each a
    /// direct object or a reference.
    pub trailer: Dictionary,
    /// Cross-reference entries recovered while parsing. Advisory only; the
    /// graph in `objects` is reconstructed by scanning indirect objects.
    pub reference_table: Xref,
    /// The last `startxref` offset seen while parsing.
    pub xref_start: Option<usize>,

    objects: BTreeMap<ObjectId, Object>,
    max_id: u32,
    rng: SmallRng,
    push_graphics_state_stream: Option<ObjectId>,
    pop_graphics_state_stream: Option<ObjectId>,
}

impl Context {
    pub fn new() -> Context {
        Context::with_version("1.7")
    }

    pub fn with_version(version: &str) -> Context {
        Context {
            version: version.to_string(),
            binary_mark: vec![0xE2, 0xE3, 0xCF, 0xD3],
            trailer: Dictionary::new(),
            reference_table: Xref::new(),
            xref_start: None,
            objects: BTreeMap::new(),
            max_id: 0,
            rng: SmallRng::seed_from_u64(1),
            push_graphics_state_stream: None,
            pop_graphics_state_stream: None,
        }
    }

    /// Largest object number allocated or assigned so far.
    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Allocate a fresh, unused reference.
    pub fn next_ref(&mut self) -> ObjectId {
        self.max_id += 1;
        (self.max_id, 0)
    }

    /// Allocate a reference and assign `object` to it.
    pub fn register<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        let id = self.next_ref();
        self.objects.insert(id, object.into());
        id
    }

    /// Insert under an externally dictated id, as the parser does. The
    /// allocation counter only ever moves up.
    pub fn assign<T: Into<Object>>(&mut self, id: ObjectId, object: T) {
        self.objects.insert(id, object.into());
        if id.0 > self.max_id {
            self.max_id = id.0;
        }
    }

    /// Remove an object from the graph. Its number is not reused.
    pub fn delete(&mut self, id: ObjectId) -> bool {
        self.objects.remove(&id).is_some()
    }

    pub fn has_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or(Error::ObjectNotFound)
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects.get_mut(&id).ok_or(Error::ObjectNotFound)
    }

    /// Resolve a reference through the graph, or pass a direct value through.
    pub fn resolve<'a>(&'a self, target: &'a Object) -> Option<&'a Object> {
        match target {
            Object::Reference(id) => self.objects.get(id),
            direct => Some(direct),
        }
    }

    /// Resolve `target` and narrow it to one of the `expected` kinds.
    ///
    /// With an empty `expected` slice any present value passes. A resolved
    /// `Null` is treated as absence unless `ObjectKind::Null` is asked for
    /// explicitly. Absence fails with [`Error::ObjectNotFound`]; a present
    /// value of the wrong kind fails with [`Error::ObjectType`].
    pub fn lookup<'a>(&'a self, target: &'a Object, expected: &[ObjectKind]) -> Result<&'a Object> {
        match self.lookup_maybe(target, expected)? {
            Some(object) => Ok(object),
            None => Err(Error::ObjectNotFound),
        }
    }

    /// Like [`Context::lookup`], but absence (including a resolved `Null`)
    /// yields `Ok(None)` instead of an error. A present value of the wrong
    /// kind still fails.
    pub fn lookup_maybe<'a>(
        &'a self,
        target: &'a Object,
        expected: &[ObjectKind],
    ) -> Result<Option<&'a Object>> {
        let preserve_null = expected.contains(&ObjectKind::Null);

        let resolved = match self.resolve(target) {
            Some(object) => object,
            None => return Ok(None),
        };
        if resolved.is_null() && !preserve_null {
            return Ok(None);
        }
        if expected.is_empty() || expected.contains(&resolved.kind()) {
            return Ok(Some(resolved));
        }
        Err(Error::ObjectType {
            expected: expected[0].name(),
            found: resolved.kind().name(),
        })
    }

    /// Reverse lookup by identity: find the id under which this exact
    /// object value is stored. Linear in the size of the graph.
    pub fn get_object_ref(&self, target: &Object) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| std::ptr::eq(*object, target))
            .map(|(&id, _)| id)
    }

    /// All `(id, object)` pairs in ascending object-number order. The
    /// ordering makes repeated serialization of the same graph
    /// byte-for-byte deterministic.
    pub fn enumerate_indirect_objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().map(|(&id, object)| (id, object))
    }

    /// Convert a native literal into an object-model value.
    pub fn obj<T: Into<Object>>(&self, literal: T) -> Object {
        literal.into()
    }

    pub fn stream(&self, content: Vec<u8>, dict: Dictionary) -> Stream {
        Stream::new(dict, content)
    }

    /// A stream whose payload is stored deflate-encoded.
    pub fn flate_stream(&self, content: &[u8], mut dict: Dictionary) -> Result<Stream> {
        dict.set("Filter", "FlateDecode");
        Ok(Stream::new(dict, filters::flate_encode(content)?))
    }

    /// A deflate-encoded stream built from content operations.
    pub fn content_stream(&self, operations: &[Operation], dict: Dictionary) -> Result<Stream> {
        let content = Content {
            operations: operations.to_vec(),
        }
        .encode()?;
        self.flate_stream(&content, dict)
    }

    /// A form XObject wrapping content operations; `BBox` and `Matrix`
    /// default to the empty box and the identity matrix.
    pub fn form_xobject(&self, operations: &[Operation], mut dict: Dictionary) -> Result<Stream> {
        if !dict.has(b"BBox") {
            dict.set("BBox", vec![0.into(), 0.into(), 0.into(), 0.into()]);
        }
        if !dict.has(b"Matrix") {
            dict.set(
                "Matrix",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 0.into()],
            );
        }
        dict.set("Type", "XObject");
        dict.set("Subtype", "Form");
        self.content_stream(operations, dict)
    }

    /// Reference to a content stream holding the single operator `q`.
    ///
    /// Appended before a page's own content so that added streams always
    /// start from a clean graphics state. Created once per context and
    /// reused by reference afterwards.
    pub fn push_graphics_state_stream(&mut self) -> Result<ObjectId> {
        if let Some(id) = self.push_graphics_state_stream {
            return Ok(id);
        }
        let stream = self.content_stream(&[Operation::new("q", vec![])], Dictionary::new())?;
        let id = self.register(stream);
        self.push_graphics_state_stream = Some(id);
        Ok(id)
    }

    /// Counterpart of [`Context::push_graphics_state_stream`], holding `Q`.
    pub fn pop_graphics_state_stream(&mut self) -> Result<ObjectId> {
        if let Some(id) = self.pop_graphics_state_stream {
            return Ok(id);
        }
        let stream = self.content_stream(&[Operation::new("Q", vec![])], Dictionary::new())?;
        let id = self.register(stream);
        self.pop_graphics_state_stream = Some(id);
        Ok(id)
    }

    /// Reseed the name-suffix generator. The generator is deterministic for
    /// a given seed and call sequence, and is not cryptographically secure;
    /// it only disambiguates names.
    pub fn seed_suffix_rng(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// `prefix` plus a pseudo-random decimal suffix of at most
    /// `suffix_length` digits, e.g. `"Font-8447"`.
    pub fn add_random_suffix(&mut self, prefix: &str, suffix_length: u32) -> String {
        let suffix = self.rng.random_range(0..10u64.pow(suffix_length));
        format!("{}-{}", prefix, suffix)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("version", &self.version)
            .field("objects", &self.objects.len())
            .field("max_id", &self.max_id)
            .field("trailer", &self.trailer)
            .finish()
    }
}
