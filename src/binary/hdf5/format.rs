//! # 最小 HDF5 对象读取器
//!
//! 只覆盖轨迹文件里常见的结构：
//! - 超级块 v0–v3（签名可位于 0/512/1024/... 的用户块之后）
//! - 对象头 v1/v2（含续块）
//! - 组: 符号表（v1 B 树 + 局部堆）与紧凑链接消息
//! - 数据集: 连续/紧凑存储；定点、浮点、枚举（h5py 的 bool）类型
//!
//! 分块存储、字符串和复合类型的数据集照常列入树中，但标记为不可读，
//! 只有被选中时才报错。密集链接存储（分形堆）的组记录警告后跳过。
//! 校验和不做验证。
//!
//! ## 依赖关系
//! - 被 `binary/hdf5/mod.rs` 使用
//! - 使用 `binary/cursor.rs`

use super::{H5Data, H5Dataset, H5Group, FORMAT};
use crate::binary::cursor::ByteCursor;
use crate::binary::element_count;
use crate::detect::magic::HDF5_SIGNATURE;
use crate::error::{Result, StructuraError};
use std::collections::{HashSet, VecDeque};

const MSG_DATASPACE: u16 = 0x0001;
const MSG_LINK_INFO: u16 = 0x0002;
const MSG_DATATYPE: u16 = 0x0003;
const MSG_LINK: u16 = 0x0006;
const MSG_LAYOUT: u16 = 0x0008;
const MSG_CONTINUATION: u16 = 0x0010;
const MSG_SYMBOL_TABLE: u16 = 0x0011;

const MAX_DEPTH: usize = 64;
const MAX_HEADER_BLOCKS: usize = 1024;

/// 查找超级块签名（用户块大小为 0 或 512 起的 2 的幂）
pub fn find_signature(bytes: &[u8]) -> Option<usize> {
    let mut pos = 0usize;
    while pos + HDF5_SIGNATURE.len() <= bytes.len() {
        if bytes[pos..pos + HDF5_SIGNATURE.len()] == HDF5_SIGNATURE {
            return Some(pos);
        }
        pos = if pos == 0 { 512 } else { pos * 2 };
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Superblock {
    pub version: u8,
    pub offset_size: u8,
    pub length_size: u8,
    /// 其余地址都相对于此
    pub base: u64,
    pub root: u64,
}

fn malformed(reason: impl Into<String>) -> StructuraError {
    StructuraError::malformed(FORMAT, reason)
}

pub fn read_superblock(bytes: &[u8], at: usize) -> Result<Superblock> {
    let mut c = ByteCursor::at(bytes, at as u64 + HDF5_SIGNATURE.len() as u64, FORMAT)?;
    let version = c.read_u8()?;
    let (offset_size, length_size) = match version {
        0 | 1 => {
            c.skip(4)?;
            let sizes = (c.read_u8()?, c.read_u8()?);
            // 保留字节、叶/内部节点 K、一致性标志；v1 另有索引存储 K
            c.skip(9)?;
            if version == 1 {
                c.skip(4)?;
            }
            sizes
        }
        2 | 3 => {
            let sizes = (c.read_u8()?, c.read_u8()?);
            c.skip(1)?;
            sizes
        }
        v => return Err(malformed(format!("unsupported superblock version {}", v))),
    };
    for size in [offset_size, length_size] {
        if !matches!(size, 2 | 4 | 8) {
            return Err(malformed(format!("invalid address/length size {}", size)));
        }
    }

    let base = c.read_uint(offset_size)?;
    let root = if version <= 1 {
        // 空闲空间、文件尾、驱动信息地址，再是根符号表项的链接名偏移
        c.skip(4 * offset_size as usize)?;
        c.read_uint(offset_size)?
    } else {
        // 扩展地址、文件尾地址
        c.skip(2 * offset_size as usize)?;
        c.read_uint(offset_size)?
    };

    Ok(Superblock {
        version,
        offset_size,
        length_size,
        base: if base == 0 { at as u64 } else { base },
        root,
    })
}

/// 对象头消息
#[derive(Debug, Clone, Copy)]
struct Message<'a> {
    kind: u16,
    data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NumberKind {
    Unsigned,
    Signed,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Datatype {
    kind: NumberKind,
    size: usize,
    big_endian: bool,
}

fn parse_datatype(data: &[u8]) -> Result<Datatype> {
    let mut c = ByteCursor::new(data, FORMAT);
    let class = c.read_u8()? & 0x0f;
    let bits = c.read_u8()?;
    c.skip(2)?;
    let size = c.read_u32()? as usize;
    let big_endian = bits & 0x01 != 0;

    match class {
        0 if (1..=8).contains(&size) => Ok(Datatype {
            kind: if bits & 0x08 != 0 {
                NumberKind::Signed
            } else {
                NumberKind::Unsigned
            },
            size,
            big_endian,
        }),
        1 if size == 4 || size == 8 => Ok(Datatype {
            kind: NumberKind::Float,
            size,
            big_endian,
        }),
        // 枚举: 基类型紧随 8 字节的类型头
        8 => parse_datatype(data.get(8..).unwrap_or_default()),
        0 | 1 => Err(malformed(format!("unsupported {}-byte numeric type", size))),
        3 => Err(malformed("string datatype")),
        6 => Err(malformed("compound datatype")),
        other => Err(malformed(format!("datatype class {}", other))),
    }
}

fn decode_values(raw: &[u8], dtype: Datatype, count: usize) -> Result<Vec<f64>> {
    let needed = count.saturating_mul(dtype.size);
    if raw.len() < needed {
        return Err(malformed(format!(
            "data holds {} byte(s), {} needed",
            raw.len(),
            needed
        )));
    }

    let values = raw[..needed]
        .chunks_exact(dtype.size)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            if dtype.big_endian {
                for (dst, src) in buf.iter_mut().zip(chunk.iter().rev()) {
                    *dst = *src;
                }
            } else {
                buf[..dtype.size].copy_from_slice(chunk);
            }
            match (dtype.kind, dtype.size) {
                (NumberKind::Float, 4) => {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(&buf[..4]);
                    f32::from_le_bytes(b) as f64
                }
                (NumberKind::Float, _) => f64::from_le_bytes(buf),
                (NumberKind::Unsigned, _) => u64::from_le_bytes(buf) as f64,
                (NumberKind::Signed, size) => {
                    let shift = 64 - 8 * size as u32;
                    ((u64::from_le_bytes(buf) << shift) as i64 >> shift) as f64
                }
            }
        })
        .collect();
    Ok(values)
}

/// 读出的对象
enum Object {
    Group(H5Group),
    Dataset(H5Dataset),
}

struct Reader<'a> {
    bytes: &'a [u8],
    sb: Superblock,
    visited: HashSet<u64>,
    warnings: Vec<String>,
}

impl<'a> Reader<'a> {
    fn is_undefined(&self, addr: u64) -> bool {
        addr == u64::MAX >> (64 - 8 * self.sb.offset_size as u32)
    }

    fn cursor(&self, addr: u64) -> Result<ByteCursor<'a>> {
        let abs = self
            .sb
            .base
            .checked_add(addr)
            .ok_or_else(|| malformed(format!("address {:#x} overflows", addr)))?;
        ByteCursor::at(self.bytes, abs, FORMAT)
    }

    fn addr(&self, c: &mut ByteCursor<'_>) -> Result<u64> {
        c.read_uint(self.sb.offset_size)
    }

    fn length(&self, c: &mut ByteCursor<'_>) -> Result<u64> {
        c.read_uint(self.sb.length_size)
    }

    fn continuation(&self, data: &[u8]) -> Result<(u64, u64)> {
        let mut c = ByteCursor::new(data, FORMAT);
        Ok((self.addr(&mut c)?, self.length(&mut c)?))
    }

    fn object_header(&self, addr: u64) -> Result<Vec<Message<'a>>> {
        let mut c = self.cursor(addr)?;
        if c.remaining() >= 4 && c.read_bytes(4)? == b"OHDR" {
            self.header_v2(addr)
        } else {
            self.header_v1(addr)
        }
    }

    fn header_v1(&self, addr: u64) -> Result<Vec<Message<'a>>> {
        let mut c = self.cursor(addr)?;
        let version = c.read_u8()?;
        if version != 1 {
            return Err(malformed(format!(
                "unknown object header version {} at {:#x}",
                version, addr
            )));
        }
        c.skip(1)?;
        let count = c.read_u16()? as usize;
        c.skip(4)?;
        let size = c.read_u32()? as u64;

        // 前缀 12 字节，消息按 8 字节对齐从 16 开始
        let mut blocks = VecDeque::from([(addr + 16, size)]);
        let mut messages = Vec::new();
        let mut seen = 0usize;
        let mut visited_blocks = 0usize;

        while let Some((start, len)) = blocks.pop_front() {
            visited_blocks += 1;
            if visited_blocks > MAX_HEADER_BLOCKS {
                return Err(malformed("too many object header continuation blocks"));
            }
            let mut c = self.cursor(start)?;
            let end = c.position().saturating_add(len as usize);
            while seen < count && c.position() + 8 <= end {
                let kind = c.read_u16()?;
                let size = c.read_u16()? as usize;
                c.skip(4)?;
                let data = c.read_bytes(size)?;
                seen += 1;
                if kind == MSG_CONTINUATION {
                    blocks.push_back(self.continuation(data)?);
                } else {
                    messages.push(Message { kind, data });
                }
            }
        }
        Ok(messages)
    }

    fn header_v2(&self, addr: u64) -> Result<Vec<Message<'a>>> {
        let mut c = self.cursor(addr)?;
        c.skip(4)?;
        let version = c.read_u8()?;
        if version != 2 {
            return Err(malformed(format!(
                "unknown OHDR version {} at {:#x}",
                version, addr
            )));
        }
        let flags = c.read_u8()?;
        if flags & 0x20 != 0 {
            c.skip(16)?;
        }
        if flags & 0x10 != 0 {
            c.skip(4)?;
        }
        let chunk_size = c.read_uint(1 << (flags & 0x03))? as usize;
        let tracked = flags & 0x04 != 0;
        let header_len = if tracked { 6 } else { 4 };

        // (绝对位置, 消息区长度)
        let mut blocks = VecDeque::from([(c.position(), chunk_size)]);
        let mut messages = Vec::new();
        let mut visited_blocks = 0usize;

        while let Some((start, len)) = blocks.pop_front() {
            visited_blocks += 1;
            if visited_blocks > MAX_HEADER_BLOCKS {
                return Err(malformed("too many object header continuation blocks"));
            }
            let mut c = ByteCursor::at(self.bytes, start as u64, FORMAT)?;
            let end = start.saturating_add(len);
            // 不足一个消息头的剩余空间是间隙
            while c.position() + header_len <= end {
                let kind = c.read_u8()? as u16;
                let size = c.read_u16()? as usize;
                c.skip(header_len - 3)?;
                let data = c.read_bytes(size)?;
                if kind == MSG_CONTINUATION {
                    let (offset, length) = self.continuation(data)?;
                    let mut block = self.cursor(offset)?;
                    if block.read_bytes(4)? != b"OCHK" {
                        return Err(malformed(format!("missing OCHK signature at {:#x}", offset)));
                    }
                    // 去掉签名与末尾校验和
                    blocks.push_back((block.position(), (length as usize).saturating_sub(8)));
                } else {
                    messages.push(Message { kind, data });
                }
            }
        }
        Ok(messages)
    }

    fn dataspace(&self, data: &[u8]) -> Result<Vec<usize>> {
        let mut c = ByteCursor::new(data, FORMAT);
        let version = c.read_u8()?;
        let rank = c.read_u8()? as usize;
        c.skip(1)?;
        match version {
            1 => c.skip(5)?,
            2 => {
                // 0 标量, 1 简单, 2 空
                if c.read_u8()? == 2 {
                    return Ok(vec![0]);
                }
            }
            v => return Err(malformed(format!("unsupported dataspace version {}", v))),
        }
        (0..rank)
            .map(|_| self.length(&mut c).map(|d| d as usize))
            .collect()
    }

    /// 数据布局消息 → 原始字节
    fn layout_bytes(&self, data: &'a [u8], needed: usize) -> Result<&'a [u8]> {
        let mut c = ByteCursor::new(data, FORMAT);
        let version = c.read_u8()?;
        let (class, address) = match version {
            3 | 4 => {
                let class = c.read_u8()?;
                let address = if class == 1 { Some(self.addr(&mut c)?) } else { None };
                (class, address)
            }
            1 | 2 => {
                let rank = c.read_u8()? as usize;
                let class = c.read_u8()?;
                c.skip(5)?;
                let address = if class != 0 { Some(self.addr(&mut c)?) } else { None };
                c.skip(rank * 4)?;
                (class, address)
            }
            v => return Err(malformed(format!("unsupported layout version {}", v))),
        };

        match (class, address) {
            (0, _) => {
                let size = if version >= 3 {
                    c.read_u16()? as usize
                } else {
                    c.read_u32()? as usize
                };
                c.read_bytes(size)
            }
            (1, Some(addr)) if self.is_undefined(addr) => Err(malformed("storage not allocated")),
            (1, Some(addr)) => self.cursor(addr)?.read_bytes(needed),
            (2, _) => Err(malformed("chunked storage is not supported")),
            (3, _) => Err(malformed("virtual storage is not supported")),
            (other, _) => Err(malformed(format!("unknown layout class {}", other))),
        }
    }

    fn dataset(&self, name: String, messages: &[Message<'a>]) -> Result<H5Dataset> {
        let find = |kind: u16| messages.iter().find(|m| m.kind == kind);
        let shape = match find(MSG_DATASPACE) {
            Some(m) => self.dataspace(m.data)?,
            None => return Err(malformed(format!("dataset '{}' has no dataspace", name))),
        };
        let count = element_count(&shape)
            .ok_or_else(|| malformed(format!("dataspace {:?} has too many elements", shape)));

        let values = count.and_then(|count| {
            find(MSG_DATATYPE)
                .ok_or_else(|| malformed("no datatype message"))
                .and_then(|m| parse_datatype(m.data))
                .and_then(|dtype| {
                    let layout = find(MSG_LAYOUT).ok_or_else(|| malformed("no layout message"))?;
                    let raw = self.layout_bytes(layout.data, count.saturating_mul(dtype.size))?;
                    decode_values(raw, dtype, count)
                })
        });

        let data = match values {
            Ok(values) => H5Data::Numeric(values),
            Err(StructuraError::MalformedInput { reason, .. }) => H5Data::Unsupported(reason),
            Err(e) => H5Data::Unsupported(e.to_string()),
        };
        Ok(H5Dataset { name, shape, data })
    }

    fn local_heap_data(&self, heap: u64) -> Result<u64> {
        let mut c = self.cursor(heap)?;
        if c.read_bytes(4)? != b"HEAP" {
            return Err(malformed(format!("missing HEAP signature at {:#x}", heap)));
        }
        c.skip(4)?;
        self.length(&mut c)?;
        self.length(&mut c)?;
        self.addr(&mut c)
    }

    fn heap_name(&self, heap_data: u64, offset: u64) -> Result<String> {
        self.cursor(heap_data.saturating_add(offset))?.read_cstr()
    }

    /// 遍历 v1 组 B 树，收集 (名字, 对象头地址)
    fn btree_entries(
        &self,
        node: u64,
        heap_data: u64,
        depth: usize,
        out: &mut Vec<(String, u64)>,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(malformed("group B-tree is too deep"));
        }
        let mut c = self.cursor(node)?;
        if c.read_bytes(4)? != b"TREE" {
            return Err(malformed(format!("missing TREE signature at {:#x}", node)));
        }
        let node_type = c.read_u8()?;
        if node_type != 0 {
            return Err(malformed(format!("B-tree node type {} is not a group node", node_type)));
        }
        let level = c.read_u8()?;
        let entries = c.read_u16()? as usize;
        self.addr(&mut c)?;
        self.addr(&mut c)?;

        let mut children = Vec::with_capacity(entries);
        for _ in 0..entries {
            self.length(&mut c)?;
            children.push(self.addr(&mut c)?);
        }

        for child in children {
            if level > 0 {
                self.btree_entries(child, heap_data, depth + 1, out)?;
            } else {
                self.symbol_node(child, heap_data, out)?;
            }
        }
        Ok(())
    }

    fn symbol_node(&self, addr: u64, heap_data: u64, out: &mut Vec<(String, u64)>) -> Result<()> {
        let mut c = self.cursor(addr)?;
        if c.read_bytes(4)? != b"SNOD" {
            return Err(malformed(format!("missing SNOD signature at {:#x}", addr)));
        }
        c.skip(2)?;
        let count = c.read_u16()? as usize;
        for _ in 0..count {
            let name_offset = self.addr(&mut c)?;
            let header = self.addr(&mut c)?;
            // 缓存类型、保留字段、草稿区
            c.skip(24)?;
            out.push((self.heap_name(heap_data, name_offset)?, header));
        }
        Ok(())
    }

    fn link(&self, data: &[u8]) -> Result<Option<(String, u64)>> {
        let mut c = ByteCursor::new(data, FORMAT);
        c.skip(1)?;
        let flags = c.read_u8()?;
        let link_type = if flags & 0x08 != 0 { c.read_u8()? } else { 0 };
        if flags & 0x04 != 0 {
            c.skip(8)?;
        }
        if flags & 0x10 != 0 {
            c.skip(1)?;
        }
        let name_len = c.read_uint(1 << (flags & 0x03))? as usize;
        let name = String::from_utf8_lossy(c.read_bytes(name_len)?).into_owned();
        if link_type != 0 {
            // 软链接/外部链接不跟随
            return Ok(None);
        }
        Ok(Some((name, self.addr(&mut c)?)))
    }

    fn children(&mut self, path: &str, messages: &[Message<'a>]) -> Result<Vec<(String, u64)>> {
        let mut children = Vec::new();
        for message in messages {
            match message.kind {
                MSG_SYMBOL_TABLE => {
                    let mut c = ByteCursor::new(message.data, FORMAT);
                    let btree = self.addr(&mut c)?;
                    let heap = self.addr(&mut c)?;
                    let heap_data = self.local_heap_data(heap)?;
                    self.btree_entries(btree, heap_data, 0, &mut children)?;
                }
                MSG_LINK => {
                    if let Some(link) = self.link(message.data)? {
                        children.push(link);
                    }
                }
                MSG_LINK_INFO => {
                    let mut c = ByteCursor::new(message.data, FORMAT);
                    c.skip(1)?;
                    if c.read_u8()? & 0x01 != 0 {
                        c.skip(8)?;
                    }
                    let fractal_heap = self.addr(&mut c)?;
                    if !self.is_undefined(fractal_heap) {
                        self.warnings.push(format!(
                            "Group '{}' uses dense link storage; its members were not read",
                            if path.is_empty() { "/" } else { path }
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(children)
    }

    fn object(&mut self, name: String, path: &str, addr: u64, depth: usize) -> Result<Object> {
        let messages = self.object_header(addr)?;
        if messages.iter().any(|m| m.kind == MSG_LAYOUT) {
            return self.dataset(name, &messages).map(Object::Dataset);
        }
        if depth > MAX_DEPTH {
            return Err(malformed(format!("group nesting deeper than {}", MAX_DEPTH)));
        }

        let mut group = H5Group::new(name);
        for (child_name, child_addr) in self.children(path, &messages)? {
            // 硬链接可能成环
            if !self.visited.insert(child_addr) {
                continue;
            }
            let child_path = format!("{}/{}", path, child_name);
            match self.object(child_name, &child_path, child_addr, depth + 1) {
                Ok(Object::Group(g)) => group.groups.push(g),
                Ok(Object::Dataset(d)) => group.datasets.push(d),
                Err(e) => self
                    .warnings
                    .push(format!("Skipping unreadable object '{}': {}", child_path, e)),
            }
        }
        Ok(Object::Group(group))
    }
}

/// 读出整棵组树，返回根组与非致命警告
pub fn read_file(bytes: &[u8], signature_at: usize) -> Result<(H5Group, Vec<String>)> {
    let sb = read_superblock(bytes, signature_at)?;
    log::debug!(
        "HDF5 superblock v{} at {}, root object at {:#x}",
        sb.version,
        signature_at,
        sb.root
    );

    let mut reader = Reader {
        bytes,
        sb,
        visited: HashSet::from([sb.root]),
        warnings: Vec::new(),
    };
    match reader.object(String::new(), "", sb.root, 0)? {
        Object::Group(root) => Ok((root, reader.warnings)),
        Object::Dataset(d) => Ok((H5Group::new("").with_dataset(d), reader.warnings)),
    }
}
