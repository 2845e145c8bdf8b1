use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{Read, Write as _};
use std::path::Path;

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::model::ScalarVolume;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a scalar volume from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.vti` – VTK XML ImageData (ascii, inline binary or appended data)
pub fn load_file(path: &Path) -> Result<ScalarVolume> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "vti" => load_vti(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Read and decode a `.vti` file.
pub fn load_vti(path: &Path) -> Result<ScalarVolume> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let volume = parse_vti(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    log::info!(
        "Loaded {} ({}x{}x{} points, range {:?})",
        path.display(),
        volume.dims[0],
        volume.dims[1],
        volume.dims[2],
        volume.scalar_range()
    );
    Ok(volume)
}

// ---------------------------------------------------------------------------
// VTK XML ImageData reader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ScalarType {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "Int8" | "Char" => ScalarType::Int8,
            "UInt8" | "UnsignedChar" => ScalarType::UInt8,
            "Int16" | "Short" => ScalarType::Int16,
            "UInt16" | "UnsignedShort" => ScalarType::UInt16,
            "Int32" | "Int" => ScalarType::Int32,
            "UInt32" | "UnsignedInt" => ScalarType::UInt32,
            "Int64" | "Long" | "LongLong" => ScalarType::Int64,
            "UInt64" | "UnsignedLong" | "UnsignedLongLong" => ScalarType::UInt64,
            "Float32" | "Float" => ScalarType::Float32,
            "Float64" | "Double" => ScalarType::Float64,
            other => bail!("Unsupported DataArray type '{other}'"),
        })
    }

    fn size(self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataFormat {
    Ascii,
    Binary,
    Appended,
}

/// Settings from the `<VTKFile>` root element that apply to every block.
#[derive(Debug, Clone, Copy)]
struct BlockLayout {
    byte_order: ByteOrder,
    /// Size in bytes of the block header integers (`header_type`).
    header_size: usize,
    compressed: bool,
}

#[derive(Debug)]
struct ArraySpec {
    name: Option<String>,
    ty: ScalarType,
    components: usize,
    format: DataFormat,
    offset: usize,
    text: String,
}

#[derive(Debug)]
struct AppendedSection {
    base64: bool,
    /// Byte position right after the `<AppendedData ...>` tag.
    start: usize,
}

/// Decode a complete `.vti` document.
pub fn parse_vti(bytes: &[u8]) -> Result<ScalarVolume> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut layout: Option<BlockLayout> = None;
    let mut whole_extent: Option<[i64; 6]> = None;
    let mut origin = [0.0; 3];
    let mut spacing = [1.0; 3];
    let mut pieces = 0usize;
    let mut in_point_data = false;
    let mut active_scalars: Option<String> = None;
    let mut arrays: Vec<ArraySpec> = Vec::new();
    let mut open_array: Option<ArraySpec> = None;
    let mut appended: Option<AppendedSection> = None;

    loop {
        let event = reader.read_event_into(&mut buf).context("malformed XML")?;
        let empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"VTKFile" => layout = Some(parse_root(&e)?),
                b"ImageData" => {
                    let attrs = attributes(&e)?;
                    let extent = attrs
                        .get("WholeExtent")
                        .context("ImageData missing WholeExtent")?;
                    whole_extent = Some(parse_fixed::<i64, 6>(extent, "WholeExtent")?);
                    if let Some(o) = attrs.get("Origin") {
                        origin = parse_fixed::<f64, 3>(o, "Origin")?;
                    }
                    if let Some(s) = attrs.get("Spacing") {
                        spacing = parse_fixed::<f64, 3>(s, "Spacing")?;
                    }
                }
                b"Piece" => {
                    pieces += 1;
                    if pieces > 1 {
                        bail!("multi-piece ImageData is not supported");
                    }
                }
                b"PointData" => {
                    in_point_data = !empty;
                    active_scalars = attributes(&e)?.remove("Scalars");
                }
                b"DataArray" if in_point_data => {
                    let spec = parse_array(&e)?;
                    if empty {
                        arrays.push(spec);
                    } else {
                        open_array = Some(spec);
                    }
                }
                b"AppendedData" => {
                    let encoding = attributes(&e)?
                        .remove("encoding")
                        .unwrap_or_else(|| "raw".to_string());
                    let base64 = match encoding.as_str() {
                        "raw" => false,
                        "base64" => true,
                        other => bail!("Unsupported AppendedData encoding '{other}'"),
                    };
                    appended = Some(AppendedSection {
                        base64,
                        start: reader.buffer_position() as usize,
                    });
                    // Raw appended bytes are not XML; stop here.
                    break;
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(spec) = open_array.as_mut() {
                    spec.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"DataArray" => {
                    if let Some(spec) = open_array.take() {
                        arrays.push(spec);
                    }
                }
                b"PointData" => in_point_data = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let layout = layout.context("not a VTKFile document")?;
    let extent = whole_extent.context("no ImageData element")?;

    let mut dims = [0usize; 3];
    for a in 0..3 {
        let n = extent[2 * a + 1] - extent[2 * a] + 1;
        if n <= 0 {
            bail!("invalid WholeExtent {extent:?}");
        }
        dims[a] = n as usize;
        origin[a] += extent[2 * a] as f64 * spacing[a];
    }

    let index = match &active_scalars {
        Some(name) => arrays
            .iter()
            .position(|a| a.name.as_deref() == Some(name.as_str()))
            .with_context(|| format!("active scalars '{name}' not found in PointData"))?,
        None if arrays.is_empty() => bail!("PointData has no DataArray"),
        None => 0,
    };
    let spec = &arrays[index];
    if spec.components > 1 {
        log::warn!(
            "array {:?} has {} components; using the first",
            spec.name,
            spec.components
        );
    }

    let values = match spec.format {
        DataFormat::Ascii => decode_ascii(&spec.text, spec.components)?,
        DataFormat::Binary => {
            let text: Vec<u8> = spec
                .text
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            let payload = decode_base64_block(&text, layout)?;
            decode_samples(&payload, spec.ty, layout.byte_order, spec.components)?
        }
        DataFormat::Appended => {
            let section = appended
                .as_ref()
                .context("DataArray refers to missing AppendedData")?;
            let payload = decode_appended(bytes, section, spec.offset, layout)?;
            decode_samples(&payload, spec.ty, layout.byte_order, spec.components)?
        }
    };

    let expected: usize = dims.iter().product();
    if values.len() != expected {
        bail!(
            "array has {} tuples but the extent needs {expected}",
            values.len()
        );
    }
    ScalarVolume::new(dims, origin, spacing, values).context("sample count mismatch")
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.context("malformed attribute")?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().context("malformed attribute value")?;
        map.insert(key, value.into_owned());
    }
    Ok(map)
}

fn parse_root(e: &BytesStart<'_>) -> Result<BlockLayout> {
    let attrs = attributes(e)?;
    if let Some(ty) = attrs.get("type") {
        if ty != "ImageData" {
            bail!("expected an ImageData file, found '{ty}'");
        }
    }
    let byte_order = match attrs.get("byte_order").map(String::as_str) {
        None | Some("LittleEndian") => ByteOrder::Little,
        Some("BigEndian") => ByteOrder::Big,
        Some(other) => bail!("Unsupported byte_order '{other}'"),
    };
    let header_size = match attrs.get("header_type").map(String::as_str) {
        None | Some("UInt32") => 4,
        Some("UInt64") => 8,
        Some(other) => bail!("Unsupported header_type '{other}'"),
    };
    let compressed = match attrs.get("compressor").map(String::as_str) {
        None | Some("") => false,
        Some("vtkZLibDataCompressor") => true,
        Some(other) => bail!("Unsupported compressor '{other}'"),
    };
    Ok(BlockLayout {
        byte_order,
        header_size,
        compressed,
    })
}

fn parse_array(e: &BytesStart<'_>) -> Result<ArraySpec> {
    let attrs = attributes(e)?;
    let ty = ScalarType::parse(attrs.get("type").context("DataArray missing type")?)?;
    let components = match attrs.get("NumberOfComponents") {
        Some(n) => n
            .trim()
            .parse::<usize>()
            .with_context(|| format!("invalid NumberOfComponents '{n}'"))?
            .max(1),
        None => 1,
    };
    let format = match attrs.get("format").map(String::as_str) {
        None | Some("ascii") => DataFormat::Ascii,
        Some("binary") => DataFormat::Binary,
        Some("appended") => DataFormat::Appended,
        Some(other) => bail!("Unsupported DataArray format '{other}'"),
    };
    let offset = match attrs.get("offset") {
        Some(o) => o
            .trim()
            .parse::<usize>()
            .with_context(|| format!("invalid offset '{o}'"))?,
        None => 0,
    };
    Ok(ArraySpec {
        name: attrs.get("Name").cloned(),
        ty,
        components,
        format,
        offset,
        text: String::new(),
    })
}

fn parse_fixed<T, const N: usize>(s: &str, what: &str) -> Result<[T; N]>
where
    T: std::str::FromStr + Copy + Default,
{
    let mut out = [T::default(); N];
    let mut tokens = s.split_whitespace();
    for slot in out.iter_mut() {
        let tok = tokens
            .next()
            .with_context(|| format!("{what} needs {N} values, got '{s}'"))?;
        *slot = tok
            .parse()
            .map_err(|_| anyhow::anyhow!("{what}: '{tok}' is not a number"))?;
    }
    Ok(out)
}

// -- Data block decoding --

fn decode_ascii(text: &str, components: usize) -> Result<Vec<f32>> {
    text.split_whitespace()
        .step_by(components)
        .enumerate()
        .map(|(i, tok)| {
            tok.parse::<f64>()
                .map(|v| v as f32)
                .with_context(|| format!("value {i}: '{tok}' is not a number"))
        })
        .collect()
}

/// Number of base64 characters that encode `n` bytes (with padding).
fn base64_len(n: usize) -> Result<usize> {
    n.div_ceil(3)
        .checked_mul(4)
        .context("block size overflows")
}

/// `start + len` as a slice end, failing on overflow.
fn block_end(start: usize, len: usize) -> Result<usize> {
    start.checked_add(len).context("block size overflows")
}

/// Byte length of a compressed block header holding `blocks` sizes.
fn compressed_header_len(blocks: usize, h: usize) -> Result<usize> {
    blocks
        .checked_add(3)
        .and_then(|n| n.checked_mul(h))
        .context("block count overflows")
}

fn read_header_int(bytes: &[u8], layout: BlockLayout) -> Result<usize> {
    let v = match layout.header_size {
        4 => {
            let arr: [u8; 4] = bytes.try_into()?;
            match layout.byte_order {
                ByteOrder::Little => u32::from_le_bytes(arr) as u64,
                ByteOrder::Big => u32::from_be_bytes(arr) as u64,
            }
        }
        _ => {
            let arr: [u8; 8] = bytes.try_into()?;
            match layout.byte_order {
                ByteOrder::Little => u64::from_le_bytes(arr),
                ByteOrder::Big => u64::from_be_bytes(arr),
            }
        }
    };
    usize::try_from(v).context("block size does not fit in memory")
}

fn header_ints(bytes: &[u8], layout: BlockLayout) -> Result<Vec<usize>> {
    bytes
        .chunks_exact(layout.header_size)
        .map(|c| read_header_int(c, layout))
        .collect()
}

fn decompress_blocks(data: &[u8], sizes: &[usize]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    for (i, &size) in sizes.iter().enumerate() {
        let end = block_end(pos, size)?;
        let chunk = data
            .get(pos..end)
            .with_context(|| format!("compressed block {i} is truncated"))?;
        ZlibDecoder::new(chunk)
            .read_to_end(&mut out)
            .with_context(|| format!("inflating block {i}"))?;
        pos = end;
    }
    Ok(out)
}

/// Decode one raw (non-encoded) block: header followed by payload.
fn decode_raw_block(data: &[u8], layout: BlockLayout) -> Result<Vec<u8>> {
    let h = layout.header_size;
    if !layout.compressed {
        let n = read_header_int(data.get(..h).context("block header is truncated")?, layout)?;
        let payload = data
            .get(h..block_end(h, n)?)
            .context("block payload is truncated")?;
        return Ok(payload.to_vec());
    }
    let prefix = header_ints(data.get(..3 * h).context("block header is truncated")?, layout)?;
    let header_len = compressed_header_len(prefix[0], h)?;
    let sizes = header_ints(
        data.get(3 * h..header_len)
            .context("block header is truncated")?,
        layout,
    )?;
    decompress_blocks(&data[header_len..], &sizes)
}

/// Decode one base64 block. The header is encoded separately from the
/// payload; uncompressed writers may also encode both as a single stream.
fn decode_base64_block(text: &[u8], layout: BlockLayout) -> Result<Vec<u8>> {
    let h = layout.header_size;
    let decode = |range: std::ops::Range<usize>| -> Result<Vec<u8>> {
        let chars = text.get(range).context("base64 data is truncated")?;
        BASE64.decode(chars).context("invalid base64 data")
    };

    if !layout.compressed {
        let head_chars = base64_len(h)?;
        let head = decode(0..head_chars)?;
        let n = read_header_int(head.get(..h).context("block header is truncated")?, layout)?;
        let separate = text[..head_chars].contains(&b'=');
        if separate {
            let payload = decode(head_chars..block_end(head_chars, base64_len(n)?)?)?;
            return payload
                .get(..n)
                .map(<[u8]>::to_vec)
                .context("block payload is truncated");
        }
        let joint = decode(0..base64_len(block_end(h, n)?)?)?;
        return joint
            .get(h..block_end(h, n)?)
            .map(<[u8]>::to_vec)
            .context("block payload is truncated");
    }

    let prefix_bytes = decode(0..base64_len(3 * h)?)?;
    let prefix = header_ints(
        prefix_bytes.get(..3 * h).context("block header is truncated")?,
        layout,
    )?;
    let header_len = compressed_header_len(prefix[0], h)?;
    let header_chars = base64_len(header_len)?;
    let header = decode(0..header_chars)?;
    let sizes = header_ints(
        header
            .get(3 * h..header_len)
            .context("block header is truncated")?,
        layout,
    )?;
    let total = sizes
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(n))
        .context("block size overflows")?;
    let data = decode(header_chars..block_end(header_chars, base64_len(total)?)?)?;
    decompress_blocks(&data, &sizes)
}

fn decode_appended(
    bytes: &[u8],
    section: &AppendedSection,
    offset: usize,
    layout: BlockLayout,
) -> Result<Vec<u8>> {
    let marker = bytes[section.start..]
        .iter()
        .position(|&b| b == b'_')
        .context("AppendedData has no '_' marker")?;
    let data_start = section.start + marker + 1;
    let block = bytes
        .get(block_end(data_start, offset)?..)
        .context("appended offset is out of range")?;
    if section.base64 {
        let end = block
            .iter()
            .position(|b| b.is_ascii_whitespace() || *b == b'<')
            .unwrap_or(block.len());
        decode_base64_block(&block[..end], layout)
    } else {
        decode_raw_block(block, layout)
    }
}

fn decode_samples(
    bytes: &[u8],
    ty: ScalarType,
    order: ByteOrder,
    components: usize,
) -> Result<Vec<f32>> {
    let size = ty.size();
    let stride = size * components;
    if bytes.len() % stride != 0 {
        bail!(
            "payload of {} bytes is not a multiple of the tuple size {stride}",
            bytes.len()
        );
    }
    bytes
        .chunks_exact(stride)
        .map(|tuple| read_scalar(&tuple[..size], ty, order))
        .collect()
}

fn read_scalar(b: &[u8], ty: ScalarType, order: ByteOrder) -> Result<f32> {
    macro_rules! num {
        ($t:ty) => {{
            let arr = b.try_into()?;
            match order {
                ByteOrder::Little => <$t>::from_le_bytes(arr) as f32,
                ByteOrder::Big => <$t>::from_be_bytes(arr) as f32,
            }
        }};
    }
    Ok(match ty {
        ScalarType::Int8 => num!(i8),
        ScalarType::UInt8 => num!(u8),
        ScalarType::Int16 => num!(i16),
        ScalarType::UInt16 => num!(u16),
        ScalarType::Int32 => num!(i32),
        ScalarType::UInt32 => num!(u32),
        ScalarType::Int64 => num!(i64),
        ScalarType::UInt64 => num!(u64),
        ScalarType::Float32 => num!(f32),
        ScalarType::Float64 => num!(f64),
    })
}

// ---------------------------------------------------------------------------
// VTK XML ImageData writer
// ---------------------------------------------------------------------------

/// How `write_vti` stores the point data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VtiEncoding {
    Ascii,
    /// Inline base64 with a `UInt32` header.
    Base64,
    /// Inline base64 of a single zlib-compressed block.
    Base64Zlib,
}

/// Write `volume` as a single-piece `.vti` file with one Float32 array.
pub fn write_vti(
    path: &Path,
    volume: &ScalarVolume,
    name: &str,
    encoding: VtiEncoding,
) -> Result<()> {
    let doc = vti_document(volume, name, encoding)?;
    std::fs::write(path, doc).with_context(|| format!("writing {}", path.display()))
}

/// Render `volume` as a `.vti` document.
pub fn vti_document(volume: &ScalarVolume, name: &str, encoding: VtiEncoding) -> Result<String> {
    let [nx, ny, nz] = volume.dims;
    let extent = format!(
        "0 {} 0 {} 0 {}",
        nx.saturating_sub(1),
        ny.saturating_sub(1),
        nz.saturating_sub(1)
    );
    let name = quick_xml::escape::escape(name);
    let (lo, hi) = volume.scalar_range();
    let compressor = match encoding {
        VtiEncoding::Base64Zlib => " compressor=\"vtkZLibDataCompressor\"",
        _ => "",
    };
    let format = match encoding {
        VtiEncoding::Ascii => "ascii",
        _ => "binary",
    };

    let mut out = String::new();
    writeln!(out, "<?xml version=\"1.0\"?>")?;
    writeln!(
        out,
        "<VTKFile type=\"ImageData\" version=\"1.0\" byte_order=\"LittleEndian\" header_type=\"UInt32\"{compressor}>"
    )?;
    writeln!(
        out,
        "  <ImageData WholeExtent=\"{extent}\" Origin=\"{} {} {}\" Spacing=\"{} {} {}\">",
        volume.origin[0],
        volume.origin[1],
        volume.origin[2],
        volume.spacing[0],
        volume.spacing[1],
        volume.spacing[2]
    )?;
    writeln!(out, "    <Piece Extent=\"{extent}\">")?;
    writeln!(out, "      <PointData Scalars=\"{name}\">")?;
    writeln!(
        out,
        "        <DataArray type=\"Float32\" Name=\"{name}\" format=\"{format}\" RangeMin=\"{lo}\" RangeMax=\"{hi}\">"
    )?;

    let raw: Vec<u8> = volume
        .values()
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    match encoding {
        VtiEncoding::Ascii => {
            for row in volume.values().chunks(nx.max(1)) {
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                writeln!(out, "          {}", line.join(" "))?;
            }
        }
        VtiEncoding::Base64 => {
            let header = u32::try_from(raw.len())
                .context("volume too large for a UInt32 header")?
                .to_le_bytes();
            writeln!(
                out,
                "          {}{}",
                BASE64.encode(header),
                BASE64.encode(&raw)
            )?;
        }
        VtiEncoding::Base64Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw)?;
            let compressed = encoder.finish()?;
            let mut header = Vec::with_capacity(16);
            for n in [1, raw.len(), raw.len(), compressed.len()] {
                let n = u32::try_from(n).context("volume too large for a UInt32 header")?;
                header.extend_from_slice(&n.to_le_bytes());
            }
            writeln!(
                out,
                "          {}{}",
                BASE64.encode(&header),
                BASE64.encode(&compressed)
            )?;
        }
    }

    writeln!(out, "        </DataArray>")?;
    writeln!(out, "      </PointData>")?;
    writeln!(out, "      <CellData>")?;
    writeln!(out, "      </CellData>")?;
    writeln!(out, "    </Piece>")?;
    writeln!(out, "  </ImageData>")?;
    writeln!(out, "</VTKFile>")?;
    Ok(out)
}
