use super::PlyError;

/// Scalar types of a PLY property.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlyDataType {
    /// `float` / `float32`
    Float32,
    /// `double` / `float64`
    Float64,
    /// `char` / `int8`
    Int8,
    /// `uchar` / `uint8`
    UInt8,
    /// `short` / `int16`
    Int16,
    /// `ushort` / `uint16`
    UInt16,
    /// `int` / `int32`
    Int32,
    /// `uint` / `uint32`
    UInt32,
}

impl PlyDataType {
    /// Parse a type name from a `property` header line.
    pub fn parse(type_str: &str) -> Result<Self, PlyError> {
        match type_str {
            "float" | "float32" => Ok(Self::Float32),
            "double" | "float64" => Ok(Self::Float64),
            "char" | "int8" => Ok(Self::Int8),
            "uchar" | "uint8" => Ok(Self::UInt8),
            "short" | "int16" => Ok(Self::Int16),
            "ushort" | "uint16" => Ok(Self::UInt16),
            "int" | "int32" => Ok(Self::Int32),
            "uint" | "uint32" => Ok(Self::UInt32),
            _ => Err(PlyError::UnsupportedProperty(format!(
                "unknown type '{type_str}'"
            ))),
        }
    }

    /// Size in bytes of one value in a binary file.
    pub fn size(&self) -> usize {
        match self {
            Self::Float32 | Self::Int32 | Self::UInt32 => 4,
            Self::Float64 => 8,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int8 | Self::UInt8 => 1,
        }
    }

    /// Decode one little endian value. `bytes` must hold exactly [`Self::size`] bytes.
    pub fn read_le(&self, bytes: &[u8]) -> Option<f64> {
        let value = match self {
            Self::Float32 => f32::from_le_bytes(bytes.try_into().ok()?) as f64,
            Self::Float64 => f64::from_le_bytes(bytes.try_into().ok()?),
            Self::Int8 => i8::from_le_bytes(bytes.try_into().ok()?) as f64,
            Self::UInt8 => u8::from_le_bytes(bytes.try_into().ok()?) as f64,
            Self::Int16 => i16::from_le_bytes(bytes.try_into().ok()?) as f64,
            Self::UInt16 => u16::from_le_bytes(bytes.try_into().ok()?) as f64,
            Self::Int32 => i32::from_le_bytes(bytes.try_into().ok()?) as f64,
            Self::UInt32 => u32::from_le_bytes(bytes.try_into().ok()?) as f64,
        };
        Some(value)
    }

    /// Full-scale value of a stored color channel, floats are already on a 0-1 scale.
    pub fn color_range(&self) -> f64 {
        match self {
            Self::Int8 | Self::UInt8 => 255.0,
            Self::Int16 | Self::UInt16 => 65535.0,
            _ => 1.0,
        }
    }
}

/// A named scalar property of the vertex element.
#[derive(Debug, PartialEq, Clone)]
pub struct PlyPropertyDefinition {
    /// Property name, e.g. `x` or `red`.
    pub name: String,
    /// Property type.
    pub data_type: PlyDataType,
}

/// Where the point attributes live inside a vertex record.
#[derive(Debug, PartialEq, Clone)]
pub struct VertexLayout {
    properties: Vec<PlyPropertyDefinition>,
    position: [usize; 3],
    color: Option<[usize; 3]>,
    normal: Option<[usize; 3]>,
}

impl VertexLayout {
    /// Resolve the attribute indices from the vertex properties.
    ///
    /// `x`, `y`, `z` are required. Colors and normals are picked up only when all three
    /// channels are present. Other properties are decoded and ignored.
    pub fn new(properties: Vec<PlyPropertyDefinition>) -> Result<Self, PlyError> {
        let find = |name: &str| properties.iter().position(|p| p.name == name);
        let find3 = |names: [&str; 3]| -> Option<[usize; 3]> {
            Some([find(names[0])?, find(names[1])?, find(names[2])?])
        };

        let position = [
            find("x").ok_or(PlyError::MissingProperty("x"))?,
            find("y").ok_or(PlyError::MissingProperty("y"))?,
            find("z").ok_or(PlyError::MissingProperty("z"))?,
        ];
        let color = find3(["red", "green", "blue"]).or_else(|| find3(["r", "g", "b"]));
        let normal = find3(["nx", "ny", "nz"]);

        Ok(Self {
            properties,
            position,
            color,
            normal,
        })
    }

    /// The vertex properties in file order.
    pub fn properties(&self) -> &[PlyPropertyDefinition] {
        &self.properties
    }

    /// Whether the vertices carry colors.
    pub fn has_colors(&self) -> bool {
        self.color.is_some()
    }

    /// Whether the vertices carry normals.
    pub fn has_normals(&self) -> bool {
        self.normal.is_some()
    }

    /// Size in bytes of one binary vertex record.
    pub fn record_size(&self) -> usize {
        self.properties.iter().map(|p| p.data_type.size()).sum()
    }

    /// Split decoded record values into position, color and normal.
    pub(crate) fn split(&self, values: &[f64]) -> Vertex {
        let pick = |idx: [usize; 3]| idx.map(|i| values[i]);
        Vertex {
            position: pick(self.position),
            color: self.color.map(|idx| {
                let mut color = pick(idx);
                for (c, i) in color.iter_mut().zip(idx) {
                    *c /= self.properties[i].data_type.color_range();
                }
                color
            }),
            normal: self.normal.map(pick),
        }
    }
}

/// The point attributes of a single vertex.
#[derive(Debug, PartialEq)]
pub(crate) struct Vertex {
    pub position: [f64; 3],
    pub color: Option<[f64; 3]>,
    pub normal: Option<[f64; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, data_type: PlyDataType) -> PlyPropertyDefinition {
        PlyPropertyDefinition {
            name: name.to_string(),
            data_type,
        }
    }

    #[test]
    fn test_data_type_parsing() -> Result<(), PlyError> {
        assert_eq!(PlyDataType::parse("float")?, PlyDataType::Float32);
        assert_eq!(PlyDataType::parse("uchar")?, PlyDataType::UInt8);
        assert_eq!(PlyDataType::parse("float64")?, PlyDataType::Float64);
        assert!(PlyDataType::parse("invalid").is_err());
        Ok(())
    }

    #[test]
    fn test_read_le() {
        assert_eq!(PlyDataType::Float32.read_le(&1.5f32.to_le_bytes()), Some(1.5));
        assert_eq!(PlyDataType::Int16.read_le(&(-3i16).to_le_bytes()), Some(-3.0));
        assert_eq!(PlyDataType::UInt8.read_le(&[200]), Some(200.0));
        assert_eq!(PlyDataType::Float64.read_le(&[0u8; 4]), None);
    }

    #[test]
    fn test_layout_split() -> Result<(), PlyError> {
        let layout = VertexLayout::new(vec![
            def("x", PlyDataType::Float32),
            def("y", PlyDataType::Float32),
            def("z", PlyDataType::Float32),
            def("intensity", PlyDataType::Float32),
            def("red", PlyDataType::UInt8),
            def("green", PlyDataType::UInt8),
            def("blue", PlyDataType::UInt8),
        ])?;
        assert!(layout.has_colors());
        assert!(!layout.has_normals());
        assert_eq!(layout.record_size(), 19);

        let vertex = layout.split(&[1.0, 2.0, 3.0, 0.7, 255.0, 0.0, 51.0]);
        assert_eq!(vertex.position, [1.0, 2.0, 3.0]);
        assert_eq!(vertex.color, Some([1.0, 0.0, 0.2]));
        assert_eq!(vertex.normal, None);
        Ok(())
    }

    #[test]
    fn test_layout_missing_position() {
        let result = VertexLayout::new(vec![
            def("x", PlyDataType::Float32),
            def("y", PlyDataType::Float32),
        ]);
        assert!(matches!(result, Err(PlyError::MissingProperty("z"))));
    }
}
