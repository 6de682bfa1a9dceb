//! Builders that assemble synthetic PSD/PSB documents byte by byte.
//!
//! Every integration test constructs its input with these helpers instead of
//! shipping binary fixtures, so each test spells out exactly the bytes it is
//! exercising.

#![allow(dead_code)]

/// A layer to be serialized into the layer and mask information section.
pub struct LayerSpec {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    /// (channel id, compression code, payload bytes)
    pub channels: Vec<(i16, u16, Vec<u8>)>,
    pub flags: u8,
    /// Legacy Pascal-string name bytes (MacRoman)
    pub name: Vec<u8>,
    /// Pre-serialized tagged blocks appended to the extra data
    pub blocks: Vec<u8>,
}

impl LayerSpec {
    pub fn new(top: i32, left: i32, bottom: i32, right: i32) -> LayerSpec {
        LayerSpec {
            top,
            left,
            bottom,
            right,
            channels: vec![],
            flags: 0,
            name: vec![],
            blocks: vec![],
        }
    }

    pub fn with_channel(mut self, id: i16, compression: u16, payload: Vec<u8>) -> LayerSpec {
        self.channels.push((id, compression, payload));
        self
    }

    pub fn with_flags(mut self, flags: u8) -> LayerSpec {
        self.flags = flags;
        self
    }

    pub fn with_name(mut self, name: &[u8]) -> LayerSpec {
        self.name = name.to_vec();
        self
    }

    pub fn with_block(mut self, key: &[u8; 4], payload: &[u8]) -> LayerSpec {
        self.blocks.extend_from_slice(&tagged_block(key, payload));
        self
    }
}

/// A whole document under construction.
pub struct DocBuilder {
    version: u16,
    channels: u16,
    height: u32,
    width: u32,
    depth: u16,
    mode: u16,
    color_mode_data: Vec<u8>,
    resources_body: Vec<u8>,
    layer_section_body: Option<Vec<u8>>,
    image_data: Vec<u8>,
}

impl DocBuilder {
    pub fn new(width: u32, height: u32, channels: u16, depth: u16, mode: u16) -> DocBuilder {
        DocBuilder {
            version: 1,
            channels,
            height,
            width,
            depth,
            mode,
            color_mode_data: vec![],
            resources_body: vec![],
            layer_section_body: None,
            image_data: vec![],
        }
    }

    /// Switch the document to the large (PSB) format.
    pub fn large(mut self) -> DocBuilder {
        self.version = 2;
        self
    }

    pub fn color_mode_data(mut self, data: &[u8]) -> DocBuilder {
        self.color_mode_data = data.to_vec();
        self
    }

    /// Append one resource block.
    pub fn resource(mut self, id: u16, name: &[u8], data: &[u8]) -> DocBuilder {
        self.resources_body.extend_from_slice(b"8BIM");
        self.resources_body.extend_from_slice(&id.to_be_bytes());
        self.resources_body.push(name.len() as u8);
        self.resources_body.extend_from_slice(name);
        if (1 + name.len()) % 2 != 0 {
            self.resources_body.push(0);
        }
        self.resources_body
            .extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.resources_body.extend_from_slice(data);
        if data.len() % 2 != 0 {
            self.resources_body.push(0);
        }
        self
    }

    /// Serialize the given layers into the section, with format-default
    /// length widths and per-channel lengths that include the compression
    /// field.
    pub fn layers(self, specs: &[LayerSpec]) -> DocBuilder {
        let large = self.version == 2;
        self.layers_with(specs, LayerSectionOptions {
            large_lengths: large,
            negative_count: false,
            lengths_include_compression: true,
        })
    }

    /// Serialize the layers with explicit control over the writer quirks.
    pub fn layers_with(mut self, specs: &[LayerSpec], options: LayerSectionOptions) -> DocBuilder {
        self.layer_section_body = Some(layer_section_body(specs, options));
        self
    }

    /// Use a raw, pre-serialized layer section body (everything after the
    /// outer length field).
    pub fn raw_layer_section(mut self, body: &[u8]) -> DocBuilder {
        self.layer_section_body = Some(body.to_vec());
        self
    }

    /// Set the image data section (compression code + payload).
    pub fn image_data(mut self, compression: u16, payload: &[u8]) -> DocBuilder {
        self.image_data = compression.to_be_bytes().to_vec();
        self.image_data.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut bytes = vec![];

        // File header
        bytes.extend_from_slice(b"8BPS");
        bytes.extend_from_slice(&self.version.to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        bytes.extend_from_slice(&self.channels.to_be_bytes());
        bytes.extend_from_slice(&self.height.to_be_bytes());
        bytes.extend_from_slice(&self.width.to_be_bytes());
        bytes.extend_from_slice(&self.depth.to_be_bytes());
        bytes.extend_from_slice(&self.mode.to_be_bytes());

        // Color mode data
        bytes.extend_from_slice(&(self.color_mode_data.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.color_mode_data);

        // Image resources
        bytes.extend_from_slice(&(self.resources_body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.resources_body);

        // Layer and mask information
        let body = self.layer_section_body.unwrap_or_default();
        if self.version == 2 {
            bytes.extend_from_slice(&(body.len() as u64).to_be_bytes());
        } else {
            bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        }
        bytes.extend_from_slice(&body);

        // Image data
        bytes.extend_from_slice(&self.image_data);

        bytes
    }
}

/// Writer quirks of the layer and mask section.
#[derive(Clone, Copy)]
pub struct LayerSectionOptions {
    /// Write 8-byte layer-info and channel lengths
    pub large_lengths: bool,
    /// Negate the layer count (transparency plane marker)
    pub negative_count: bool,
    /// Per-channel lengths count the 2-byte compression field
    pub lengths_include_compression: bool,
}

/// Serialize the layer section body: layer info subsection (length, count,
/// records, channel image data) followed by an empty global mask.
pub fn layer_section_body(specs: &[LayerSpec], options: LayerSectionOptions) -> Vec<u8> {
    let mut inner = vec![];

    let mut count = specs.len() as i16;
    if options.negative_count {
        count = -count;
    }
    inner.extend_from_slice(&count.to_be_bytes());

    for spec in specs {
        inner.extend_from_slice(&spec.top.to_be_bytes());
        inner.extend_from_slice(&spec.left.to_be_bytes());
        inner.extend_from_slice(&spec.bottom.to_be_bytes());
        inner.extend_from_slice(&spec.right.to_be_bytes());

        inner.extend_from_slice(&(spec.channels.len() as u16).to_be_bytes());
        for (id, _, payload) in &spec.channels {
            inner.extend_from_slice(&id.to_be_bytes());
            let mut stored_len = payload.len() as u64;
            if options.lengths_include_compression {
                stored_len += 2;
            }
            if options.large_lengths {
                inner.extend_from_slice(&stored_len.to_be_bytes());
            } else {
                inner.extend_from_slice(&(stored_len as u32).to_be_bytes());
            }
        }

        inner.extend_from_slice(b"8BIM");
        inner.extend_from_slice(b"norm");
        inner.push(255); // opacity
        inner.push(0); // clipping
        inner.push(spec.flags);
        inner.push(0); // filler

        let extra = extra_data(&spec.name, &spec.blocks);
        inner.extend_from_slice(&(extra.len() as u32).to_be_bytes());
        inner.extend_from_slice(&extra);
    }

    // Channel image data, concatenated in layer order
    for spec in specs {
        for (_, compression, payload) in &spec.channels {
            inner.extend_from_slice(&compression.to_be_bytes());
            inner.extend_from_slice(payload);
        }
    }

    let mut body = vec![];
    if options.large_lengths {
        body.extend_from_slice(&(inner.len() as u64).to_be_bytes());
    } else {
        body.extend_from_slice(&(inner.len() as u32).to_be_bytes());
    }
    body.extend_from_slice(&inner);

    // Global layer mask info: empty
    body.extend_from_slice(&0u32.to_be_bytes());

    body
}

/// Extra data: empty mask data, empty blending ranges, the Pascal name
/// padded to a multiple of 4, then tagged blocks.
pub fn extra_data(name: &[u8], blocks: &[u8]) -> Vec<u8> {
    let mut out = vec![];
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());

    out.push(name.len() as u8);
    out.extend_from_slice(name);
    let mut name_total = 1 + name.len();
    while name_total % 4 != 0 {
        out.push(0);
        name_total += 1;
    }

    out.extend_from_slice(blocks);
    out
}

/// One tagged block with even padding.
pub fn tagged_block(key: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = vec![];
    out.extend_from_slice(b"8BIM");
    out.extend_from_slice(key);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 != 0 {
        out.push(0);
    }
    out
}

/// A 'luni' payload for the given name.
pub fn luni_payload(name: &str) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let mut out = vec![];
    out.extend_from_slice(&(units.len() as u32).to_be_bytes());
    for unit in units {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

// --- descriptor serialization -------------------------------------------

/// Append a class-id token in OSType form.
pub fn push_ostype(out: &mut Vec<u8>, id: &[u8; 4]) {
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(id);
}

/// Append a Unicode string (u32 code-unit count + UTF-16BE units).
pub fn push_unicode(out: &mut Vec<u8>, s: &str) {
    let units: Vec<u16> = s.encode_utf16().collect();
    out.extend_from_slice(&(units.len() as u32).to_be_bytes());
    for unit in units {
        out.extend_from_slice(&unit.to_be_bytes());
    }
}

/// A descriptor in the named layout: empty Unicode name, class id, property
/// count, then the pre-serialized property bytes.
pub fn descriptor(class_id: &[u8; 4], property_count: u32, properties: &[u8]) -> Vec<u8> {
    let mut out = vec![];
    push_unicode(&mut out, "");
    push_ostype(&mut out, class_id);
    out.extend_from_slice(&property_count.to_be_bytes());
    out.extend_from_slice(properties);
    out
}

/// A complete 'TySh' payload: version, transform, versions, a text
/// descriptor holding `"Txt "` and `EngineData`, an empty warp descriptor,
/// and the trailing bounds.
pub fn tysh_payload(
    text: &str,
    engine_data: &[u8],
    transform: [f64; 6],
    bounds: [f64; 4],
) -> Vec<u8> {
    let mut properties = vec![];

    push_ostype(&mut properties, b"Txt ");
    properties.extend_from_slice(b"TEXT");
    push_unicode(&mut properties, text);

    // The key is a long-form class id; the value tag is one this parser
    // keeps opaque, exactly how Photoshop writes engine data
    properties.extend_from_slice(&(b"EngineData".len() as u32).to_be_bytes());
    properties.extend_from_slice(b"EngineData");
    properties.extend_from_slice(b"tdta");
    properties.extend_from_slice(&(engine_data.len() as u32).to_be_bytes());
    properties.extend_from_slice(engine_data);

    let text_descriptor = descriptor(b"TxLr", 2, &properties);
    let warp_descriptor = descriptor(b"warp", 0, &[]);

    let mut payload = vec![];
    payload.extend_from_slice(&1u16.to_be_bytes()); // TySh version
    for value in transform {
        payload.extend_from_slice(&value.to_be_bytes());
    }
    payload.extend_from_slice(&50u16.to_be_bytes()); // text version
    payload.extend_from_slice(&16u32.to_be_bytes()); // text descriptor version
    payload.extend_from_slice(&text_descriptor);
    payload.extend_from_slice(&1u16.to_be_bytes()); // warp version
    payload.extend_from_slice(&16u32.to_be_bytes()); // warp descriptor version
    payload.extend_from_slice(&warp_descriptor);
    for value in bounds {
        payload.extend_from_slice(&value.to_be_bytes());
    }

    payload
}
