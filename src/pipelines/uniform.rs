//! Typed uniform values and their byte layout inside a uniform block.

use cgmath::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// A single uniform value. Matrices are column-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat2([[f32; 2]; 2]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarClass {
    Float,
    Integer,
}

/// Shape of a uniform as declared in a shader: `columns` is 1 for scalars and vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformShape {
    pub class: ScalarClass,
    pub columns: u8,
    pub rows: u8,
}

impl UniformShape {
    pub const fn new(class: ScalarClass, columns: u8, rows: u8) -> Self {
        Self {
            class,
            columns,
            rows,
        }
    }

    /// Bytes between two matrix columns. vec2 columns pack at 8, wider ones at 16.
    pub fn column_stride(&self) -> usize {
        match self.rows {
            1 => 4,
            2 => 8,
            _ => 16,
        }
    }

    /// Number of bytes a value of this shape occupies in a block.
    pub fn size(&self) -> usize {
        if self.columns == 1 {
            4 * self.rows as usize
        } else {
            self.column_stride() * self.columns as usize
        }
    }
}

impl UniformValue {
    pub fn shape(&self) -> UniformShape {
        use ScalarClass::*;
        match self {
            UniformValue::Bool(_) | UniformValue::Int(_) => UniformShape::new(Integer, 1, 1),
            UniformValue::Float(_) => UniformShape::new(Float, 1, 1),
            UniformValue::Vec2(_) => UniformShape::new(Float, 1, 2),
            UniformValue::Vec3(_) => UniformShape::new(Float, 1, 3),
            UniformValue::Vec4(_) => UniformShape::new(Float, 1, 4),
            UniformValue::Mat2(_) => UniformShape::new(Float, 2, 2),
            UniformValue::Mat3(_) => UniformShape::new(Float, 3, 3),
            UniformValue::Mat4(_) => UniformShape::new(Float, 4, 4),
        }
    }

    /// Bytes as they are laid out inside a uniform block.
    pub fn to_bytes(&self) -> Vec<u8> {
        let shape = self.shape();
        match self {
            UniformValue::Bool(b) => u32::from(*b).to_ne_bytes().to_vec(),
            UniformValue::Int(i) => i.to_ne_bytes().to_vec(),
            UniformValue::Float(f) => f.to_ne_bytes().to_vec(),
            UniformValue::Vec2(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Mat2(m) => pack_columns(m.iter().map(|c| c.as_slice()), &shape),
            UniformValue::Mat3(m) => pack_columns(m.iter().map(|c| c.as_slice()), &shape),
            UniformValue::Mat4(m) => pack_columns(m.iter().map(|c| c.as_slice()), &shape),
        }
    }
}

fn pack_columns<'a>(columns: impl Iterator<Item = &'a [f32]>, shape: &UniformShape) -> Vec<u8> {
    let stride = shape.column_stride();
    let mut bytes = vec![0u8; shape.size()];
    for (i, column) in columns.enumerate() {
        let column: &[u8] = bytemuck::cast_slice(column);
        bytes[i * stride..i * stride + column.len()].copy_from_slice(column);
    }
    bytes
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Bool(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Vector2<f32>> for UniformValue {
    fn from(value: Vector2<f32>) -> Self {
        UniformValue::Vec2(value.into())
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(value: Vector3<f32>) -> Self {
        UniformValue::Vec3(value.into())
    }
}

impl From<Vector4<f32>> for UniformValue {
    fn from(value: Vector4<f32>) -> Self {
        UniformValue::Vec4(value.into())
    }
}

impl From<Matrix2<f32>> for UniformValue {
    fn from(value: Matrix2<f32>) -> Self {
        UniformValue::Mat2(value.into())
    }
}

impl From<Matrix3<f32>> for UniformValue {
    fn from(value: Matrix3<f32>) -> Self {
        UniformValue::Mat3(value.into())
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(value: Matrix4<f32>) -> Self {
        UniformValue::Mat4(value.into())
    }
}
