//! # ASE ULM 轨迹解码器
//!
//! ULM 容器布局（全部小端）：
//! - 头部 48 字节: `"- of Ulm"` + 16 字节标签 + int64 版本 + int64 条目数 + int64 偏移表位置
//! - 偏移表: 每个条目一个 int64 文件偏移
//! - 条目: int64 长度 + UTF-8 JSON；大数组以 `{"ndarray": [shape, dtype, offset]}` 引用
//!
//! ASE 只在原子数、晶胞或周期性变化时才写入它们，所以这些字段从上一帧继承。
//! 计算器结果在 `calculator` 子对象中。
//!
//! ## 依赖关系
//! - 被 `binary/mod.rs` 使用
//! - 使用 `binary/cursor.rs`, `trajectory/assemble.rs`, `models/`, `serde_json`

use super::cursor::ByteCursor;
use super::element_count;
use crate::detect::magic::ULM_SIGNATURE;
use crate::error::{Result, StructuraError};
use crate::math::Matrix3;
use crate::models::element::{symbol_for_number, DUMMY_SYMBOL};
use crate::models::{Frame, FrameMetadata, Lattice, MetaValue, ParsedStructure, Trajectory};
use crate::trajectory::TrajectoryBuilder;
use serde_json::{Map, Value};

const FORMAT: &str = "ase";

/// ASE 轨迹的 ULM 标签
const TRAJECTORY_TAG: &str = "ASE-Trajectory";

const HEADER_LEN: usize = 48;

/// 数组元素类型
#[derive(Debug, Clone, Copy, PartialEq)]
enum Dtype {
    F64,
    F32,
    I64,
    I32,
    I16,
    I8,
    U8,
}

impl Dtype {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "float64" => Dtype::F64,
            "float32" => Dtype::F32,
            "int64" => Dtype::I64,
            "int32" => Dtype::I32,
            "int16" => Dtype::I16,
            "int8" => Dtype::I8,
            "uint8" | "bool" => Dtype::U8,
            other => {
                return Err(StructuraError::malformed(
                    FORMAT,
                    format!("unsupported ndarray dtype '{}'", other),
                ))
            }
        })
    }

    fn size(self) -> usize {
        match self {
            Dtype::F64 | Dtype::I64 => 8,
            Dtype::F32 | Dtype::I32 => 4,
            Dtype::I16 => 2,
            Dtype::I8 | Dtype::U8 => 1,
        }
    }

    fn read(self, cursor: &mut ByteCursor<'_>) -> Result<f64> {
        Ok(match self {
            Dtype::F64 => cursor.read_f64()?,
            Dtype::F32 => f32::from_bits(cursor.read_u32()?) as f64,
            Dtype::I64 => cursor.read_i64()? as f64,
            Dtype::I32 => cursor.read_u32()? as i32 as f64,
            Dtype::I16 => cursor.read_u16()? as i16 as f64,
            Dtype::I8 => cursor.read_u8()? as i8 as f64,
            Dtype::U8 => cursor.read_u8()? as f64,
        })
    }
}

/// 解码后的数组（行优先展平）
#[derive(Debug, Clone, PartialEq)]
struct NdArray {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl NdArray {
    fn rows3(&self, what: &str) -> Result<Vec<[f64; 3]>> {
        if self.values.len() % 3 != 0 {
            return Err(StructuraError::malformed(
                FORMAT,
                format!("{} has {} values, not a multiple of 3", what, self.values.len()),
            ));
        }
        Ok(self
            .values
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect())
    }
}

#[derive(Debug)]
struct UlmHeader {
    tag: String,
    version: i64,
    offsets: Vec<u64>,
}

struct UlmReader<'a> {
    bytes: &'a [u8],
}

/// 签名检查，失败时不回退到文本解析
fn check_signature(bytes: &[u8]) -> Result<()> {
    if bytes.starts_with(b"PickleTrajectory") {
        return Err(StructuraError::unsupported_binary(
            "ASE pickle trajectory",
            "old pickle-based ASE trajectories are not supported; convert with `ase convert` to the ULM .traj format",
        ));
    }
    if !bytes.starts_with(ULM_SIGNATURE) {
        let found = &bytes[..bytes.len().min(ULM_SIGNATURE.len())];
        return Err(StructuraError::InvalidSignature {
            format: "ASE ULM".to_string(),
            expected: format!("{:?}", String::from_utf8_lossy(ULM_SIGNATURE)),
            found: format!("{:?}", String::from_utf8_lossy(found)),
        });
    }
    Ok(())
}

impl<'a> UlmReader<'a> {
    fn open(bytes: &'a [u8]) -> Result<(Self, UlmHeader)> {
        check_signature(bytes)?;
        if bytes.len() < HEADER_LEN {
            return Err(StructuraError::malformed(FORMAT, "file shorter than the ULM header"));
        }

        let mut cursor = ByteCursor::at(bytes, ULM_SIGNATURE.len() as u64, FORMAT)?;
        let tag = String::from_utf8_lossy(cursor.read_bytes(16)?)
            .trim_end_matches(|c: char| c == ' ' || c == '\0')
            .to_string();
        let version = cursor.read_i64()?;
        let nitems = cursor.read_i64()?;
        let offsets_pos = cursor.read_i64()?;

        let nitems = usize::try_from(nitems)
            .map_err(|_| StructuraError::malformed(FORMAT, format!("negative item count {}", nitems)))?;
        let offsets_pos = u64::try_from(offsets_pos).map_err(|_| {
            StructuraError::malformed(FORMAT, format!("negative offsets position {}", offsets_pos))
        })?;

        let mut table = ByteCursor::at(bytes, offsets_pos, FORMAT)?;
        if nitems.saturating_mul(8) > table.remaining() {
            return Err(StructuraError::malformed(
                FORMAT,
                format!("offset table for {} item(s) runs past end of file", nitems),
            ));
        }
        let offsets = (0..nitems)
            .map(|_| table.read_u64())
            .collect::<Result<Vec<_>>>()?;

        Ok((
            UlmReader { bytes },
            UlmHeader {
                tag,
                version,
                offsets,
            },
        ))
    }

    fn item(&self, offset: u64) -> Result<Map<String, Value>> {
        let mut cursor = ByteCursor::at(self.bytes, offset, FORMAT)?;
        let len = cursor.read_i64()?;
        let len = usize::try_from(len)
            .map_err(|_| StructuraError::malformed(FORMAT, format!("negative item length {}", len)))?;
        let text = cursor.read_bytes(len)?;
        match serde_json::from_slice(text)? {
            Value::Object(map) => Ok(map),
            _ => Err(StructuraError::malformed(FORMAT, "item is not a JSON object")),
        }
    }

    /// 内联 JSON 数组或 `ndarray` 引用
    fn array(&self, value: &Value, what: &str) -> Result<NdArray> {
        if let Some(reference) = value.get("ndarray").and_then(Value::as_array) {
            return self.read_ndarray(reference, what);
        }
        let mut shape = Vec::new();
        let mut values = Vec::new();
        flatten(value, 0, &mut shape, &mut values, what)?;
        if element_count(&shape) != Some(values.len()) {
            return Err(StructuraError::malformed(FORMAT, format!("{} is a ragged array", what)));
        }
        Ok(NdArray { shape, values })
    }

    fn read_ndarray(&self, reference: &[Value], what: &str) -> Result<NdArray> {
        let bad = || StructuraError::malformed(FORMAT, format!("invalid ndarray reference for {}", what));
        let [shape, dtype, offset] = reference else {
            return Err(bad());
        };
        let shape: Vec<usize> = serde_json::from_value(shape.clone()).map_err(|_| bad())?;
        let dtype = Dtype::parse(dtype.as_str().ok_or_else(bad)?)?;
        let offset = offset.as_u64().ok_or_else(bad)?;

        let count = element_count(&shape).ok_or_else(|| {
            StructuraError::malformed(
                FORMAT,
                format!("{} shape {:?} has too many elements", what, shape),
            )
        })?;
        let mut cursor = ByteCursor::at(self.bytes, offset, FORMAT)?;
        if count.saturating_mul(dtype.size()) > cursor.remaining() {
            return Err(StructuraError::malformed(
                FORMAT,
                format!("{} data ({} element(s)) runs past end of file", what, count),
            ));
        }
        let values = (0..count)
            .map(|_| dtype.read(&mut cursor))
            .collect::<Result<Vec<_>>>()?;
        Ok(NdArray { shape, values })
    }

    fn scalar(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            _ => self
                .array(value, "scalar")
                .ok()
                .filter(|a| a.values.len() == 1)
                .map(|a| a.values[0]),
        }
    }
}

fn flatten(
    value: &Value,
    depth: usize,
    shape: &mut Vec<usize>,
    out: &mut Vec<f64>,
    what: &str,
) -> Result<()> {
    match value {
        Value::Array(items) => {
            if shape.len() == depth {
                shape.push(items.len());
            }
            for item in items {
                flatten(item, depth + 1, shape, out, what)?;
            }
        }
        Value::Number(n) => out.push(n.as_f64().unwrap_or(f64::NAN)),
        Value::Bool(b) => out.push(if *b { 1.0 } else { 0.0 }),
        other => {
            return Err(StructuraError::malformed(
                FORMAT,
                format!("{} contains non-numeric value {}", what, other),
            ))
        }
    }
    Ok(())
}

/// 上一帧写入、本帧可能省略的数据
#[derive(Debug, Default)]
struct Carried {
    numbers: Option<Vec<u32>>,
    cell: Option<Matrix3>,
    pbc: Option<[bool; 3]>,
    masses: Option<Vec<f64>>,
}

fn meta_value(value: &Value) -> Option<MetaValue> {
    match value {
        Value::Bool(b) => Some(MetaValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(MetaValue::Int)
            .or_else(|| n.as_f64().map(MetaValue::Float)),
        Value::String(s) => Some(MetaValue::Text(s.clone())),
        Value::Array(items) => {
            let floats: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
            floats.map(MetaValue::FloatList)
        }
        _ => None,
    }
}

impl<'a> UlmReader<'a> {
    fn update_carried(&self, item: &Map<String, Value>, carried: &mut Carried) -> Result<()> {
        if let Some(v) = item.get("numbers") {
            let numbers = self.array(v, "numbers")?;
            carried.numbers = Some(numbers.values.iter().map(|z| z.round().max(0.0) as u32).collect());
        }
        if let Some(v) = item.get("cell") {
            let cell = self.array(v, "cell")?;
            let rows = cell.rows3("cell")?;
            if rows.len() != 3 {
                return Err(StructuraError::malformed(
                    FORMAT,
                    format!("cell must be 3x3, got shape {:?}", cell.shape),
                ));
            }
            carried.cell = Some([rows[0], rows[1], rows[2]]);
        }
        if let Some(v) = item.get("pbc") {
            let pbc = self.array(v, "pbc")?;
            if let [a, b, c] = pbc.values[..] {
                carried.pbc = Some([a != 0.0, b != 0.0, c != 0.0]);
            }
        }
        if let Some(v) = item.get("masses") {
            carried.masses = Some(self.array(v, "masses")?.values);
        }
        Ok(())
    }

    fn calculator(&self, calc: &Map<String, Value>, metadata: &mut FrameMetadata) -> Result<()> {
        for (key, value) in calc {
            match key.as_str() {
                "energy" => metadata.energy = self.scalar(value),
                "forces" => metadata.set_forces(self.array(value, "forces")?.rows3("forces")?),
                "stress" => metadata.set_stress_flat(&self.array(value, "stress")?.values),
                "name" => {
                    if let Some(name) = value.as_str() {
                        metadata
                            .extra
                            .insert("calculator".to_string(), MetaValue::Text(name.to_string()));
                    }
                }
                _ => {
                    if let Some(v) = self.scalar(value) {
                        metadata.extra.insert(key.clone(), MetaValue::Float(v));
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_frame(
        &self,
        index: usize,
        item: &Map<String, Value>,
        carried: &mut Carried,
    ) -> Result<Frame> {
        self.update_carried(item, carried)?;

        let searched = || vec![format!("frame {} keys: {}", index, item.keys().cloned().collect::<Vec<_>>().join(", "))];
        let positions = item
            .get("positions")
            .ok_or_else(|| StructuraError::MissingRequiredDataset {
                dataset: "positions".to_string(),
                searched: searched(),
            })?;
        let positions = self.array(positions, "positions")?.rows3("positions")?;
        let numbers = carried
            .numbers
            .as_ref()
            .ok_or_else(|| StructuraError::MissingRequiredDataset {
                dataset: "numbers".to_string(),
                searched: searched(),
            })?;
        if numbers.len() != positions.len() {
            return Err(StructuraError::malformed(
                FORMAT,
                format!(
                    "frame {} has {} positions but {} atomic numbers",
                    index,
                    positions.len(),
                    numbers.len()
                ),
            ));
        }

        // 全零晶胞表示非周期体系
        let lattice = carried
            .cell
            .filter(|m| m.iter().flatten().any(|v| v.abs() > 1e-12))
            .map(|m| Lattice::from_matrix(m).with_pbc(carried.pbc.unwrap_or([true; 3])));
        let frame = lattice.as_ref().map(Lattice::frame);

        let sites = positions
            .iter()
            .zip(numbers)
            .enumerate()
            .map(|(i, (xyz, &z))| {
                let symbol = symbol_for_number(z).unwrap_or(DUMMY_SYMBOL);
                let mut site = ParsedStructure::site_from_cartesian(frame.as_ref(), symbol, *xyz);
                if let Some(mass) = carried.masses.as_ref().and_then(|m| m.get(i)) {
                    site.properties.mass = Some(*mass);
                }
                site
            })
            .collect();

        let mut metadata = FrameMetadata::default();
        if let Some(calc) = item.get("calculator").and_then(Value::as_object) {
            self.calculator(calc, &mut metadata)?;
        }

        let mut step = index as f64;
        if let Some(info) = item.get("info").and_then(Value::as_object) {
            for (key, value) in info {
                match key.as_str() {
                    "step" | "timestep" => step = value.as_f64().unwrap_or(step),
                    "temperature" => metadata.temperature = value.as_f64(),
                    "pressure" => metadata.pressure = value.as_f64(),
                    "energy" if metadata.energy.is_none() => metadata.energy = value.as_f64(),
                    _ => {
                        if let Some(v) = meta_value(value) {
                            metadata.extra.insert(key.clone(), v);
                        }
                    }
                }
            }
        }

        Ok(Frame::new(ParsedStructure::new(sites, lattice), step).with_metadata(metadata))
    }
}

/// 解码 ASE ULM 轨迹
pub fn parse_ase(bytes: &[u8], max_frames: Option<usize>) -> Result<Trajectory> {
    let (reader, header) = UlmReader::open(bytes)?;

    let mut builder = TrajectoryBuilder::new(FORMAT);
    if header.tag != TRAJECTORY_TAG {
        builder.metadata_mut().warn(format!(
            "ULM tag '{}' is not '{}'; decoding as a trajectory anyway",
            header.tag, TRAJECTORY_TAG
        ));
    }
    builder
        .metadata_mut()
        .extra
        .insert("ulm_version".to_string(), MetaValue::Int(header.version));

    // 继承关系要求按顺序解码
    let mut carried = Carried::default();
    for (i, &offset) in header
        .offsets
        .iter()
        .take(max_frames.unwrap_or(usize::MAX))
        .enumerate()
    {
        let result = reader
            .item(offset)
            .and_then(|item| reader.decode_frame(i, &item, &mut carried));
        match result {
            Err(e @ StructuraError::MissingRequiredDataset { .. }) => return Err(e),
            other => builder.push_result(i, other),
        }
    }
    builder.finish()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// 测试用 ULM 写入器
    pub(crate) struct UlmWriter {
        buf: Vec<u8>,
        offsets: Vec<u64>,
    }

    impl UlmWriter {
        pub(crate) fn new() -> Self {
            UlmWriter {
                buf: vec![0; HEADER_LEN],
                offsets: Vec::new(),
            }
        }

        pub(crate) fn f64_array(&mut self, shape: &[usize], data: &[f64]) -> Value {
            let offset = self.buf.len();
            for v in data {
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            json!({"ndarray": [shape, "float64", offset]})
        }

        pub(crate) fn i64_array(&mut self, data: &[i64]) -> Value {
            let offset = self.buf.len();
            for v in data {
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            json!({"ndarray": [[data.len()], "int64", offset]})
        }

        pub(crate) fn item(&mut self, value: Value) {
            let text = value.to_string();
            self.offsets.push(self.buf.len() as u64);
            self.buf.extend_from_slice(&(text.len() as i64).to_le_bytes());
            self.buf.extend_from_slice(text.as_bytes());
        }

        pub(crate) fn finish(mut self) -> Vec<u8> {
            let offsets_pos = self.buf.len() as i64;
            for o in &self.offsets {
                self.buf.extend_from_slice(&o.to_le_bytes());
            }
            let mut header = Vec::with_capacity(HEADER_LEN);
            header.extend_from_slice(ULM_SIGNATURE);
            header.extend_from_slice(format!("{:<16}", TRAJECTORY_TAG).as_bytes());
            header.extend_from_slice(&3i64.to_le_bytes());
            header.extend_from_slice(&(self.offsets.len() as i64).to_le_bytes());
            header.extend_from_slice(&offsets_pos.to_le_bytes());
            self.buf[..HEADER_LEN].copy_from_slice(&header);
            self.buf
        }
    }

    /// 两帧水分子：第二帧省略 numbers/cell/pbc
    pub(crate) fn water_trajectory() -> Vec<u8> {
        let mut w = UlmWriter::new();
        let numbers = w.i64_array(&[8, 1, 1]);
        let pos0 = w.f64_array(&[3, 3], &[0.0, 0.0, 0.0, 0.96, 0.0, 0.0, -0.24, 0.93, 0.0]);
        let forces = w.f64_array(&[3, 3], &[0.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
        w.item(json!({
            "numbers": numbers,
            "positions": pos0,
            "cell": [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            "pbc": [true, true, false],
            "calculator": {
                "name": "emt",
                "energy": -14.5,
                "free_energy": -14.6,
                "forces": forces,
                "stress": [1.0, 2.0, 3.0, 0.4, 0.5, 0.6]
            }
        }));
        let pos1 = w.f64_array(&[3, 3], &[0.1, 0.0, 0.0, 1.06, 0.0, 0.0, -0.14, 0.93, 0.0]);
        w.item(json!({
            "positions": pos1,
            "calculator": {"energy": -14.2},
            "info": {"temperature": 300.0, "step": 50, "label": "md"}
        }));
        w.finish()
    }

    #[test]
    fn test_decode_two_frames_with_carry_forward() {
        let trajectory = parse_ase(&water_trajectory(), None).unwrap();
        assert_eq!(trajectory.frames.len(), 2);
        assert!(trajectory.metadata.warnings.is_empty());

        let first = &trajectory.frames[0];
        assert_eq!(first.structure.formula(), "H2O");
        assert_eq!(first.step, 0.0);
        let lattice = first.structure.lattice.as_ref().unwrap();
        assert_eq!(lattice.pbc, [true, true, false]);
        assert!((first.structure.sites[1].abc[0] - 0.096).abs() < 1e-12);

        assert_eq!(first.metadata.energy, Some(-14.5));
        assert_eq!(first.metadata.force_max, Some(5.0));
        assert_eq!(
            first.metadata.extra.get("free_energy"),
            Some(&MetaValue::Float(-14.6))
        );
        let stress = first.metadata.stress.unwrap();
        assert_eq!(stress[0][1], 0.6);
        assert_eq!(stress[1][2], 0.4);

        let second = &trajectory.frames[1];
        assert_eq!(second.structure.sites[0].element(), "O");
        assert_eq!(second.step, 50.0);
        assert_eq!(second.metadata.temperature, Some(300.0));
        assert_eq!(second.structure.lattice.as_ref().unwrap().pbc, [true, true, false]);
        assert_eq!(
            second.metadata.extra.get("label"),
            Some(&MetaValue::Text("md".to_string()))
        );
    }

    #[test]
    fn test_max_frames() {
        let trajectory = parse_ase(&water_trajectory(), Some(1)).unwrap();
        assert_eq!(trajectory.frames.len(), 1);
    }

    #[test]
    fn test_zero_cell_is_molecule() {
        let mut w = UlmWriter::new();
        w.item(json!({
            "numbers": [6],
            "positions": [[1.0, 2.0, 3.0]],
            "cell": [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
            "pbc": [false, false, false]
        }));
        let trajectory = parse_ase(&w.finish(), None).unwrap();
        let structure = &trajectory.frames[0].structure;
        assert!(structure.lattice.is_none());
        assert_eq!(structure.sites[0].xyz, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_signature_errors() {
        assert!(matches!(
            parse_ase(b"PickleTrajectory\x80\x02", None),
            Err(StructuraError::UnsupportedBinaryFormat { .. })
        ));
        assert!(matches!(
            parse_ase(b"not an ulm file at all, clearly text", None),
            Err(StructuraError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_missing_numbers_is_fatal() {
        let mut w = UlmWriter::new();
        w.item(json!({"positions": [[0.0, 0.0, 0.0]]}));
        match parse_ase(&w.finish(), None) {
            Err(StructuraError::MissingRequiredDataset { dataset, .. }) => {
                assert_eq!(dataset, "numbers")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_overflowing_ndarray_shape_is_rejected() {
        let mut w = UlmWriter::new();
        w.item(json!({"numbers": [1], "positions": [[0.0, 0.0, 0.0]]}));
        let huge = w.f64_array(&[1 << 33, 1 << 33, 3], &[0.0; 3]);
        w.item(json!({"positions": huge}));
        let trajectory = parse_ase(&w.finish(), None).unwrap();

        assert_eq!(trajectory.frames.len(), 1);
        assert_eq!(trajectory.metadata.warnings.len(), 1);
        assert!(trajectory.metadata.warnings[0].contains("too many elements"));
    }

    #[test]
    fn test_bad_frame_is_skipped() {
        let mut w = UlmWriter::new();
        w.item(json!({"numbers": [1, 1], "positions": [[0.0, 0.0, 0.0], [0.7, 0.0, 0.0]]}));
        w.item(json!({"positions": [[0.0, 0.0, 0.0]]}));
        let trajectory = parse_ase(&w.finish(), None).unwrap();
        assert_eq!(trajectory.frames.len(), 1);
        assert_eq!(trajectory.metadata.warnings.len(), 1);
    }
}
