//! Typestate writer for scene files
//!
//! The writer's type tracks which block comes next, so blocks can only be
//! written in file order:
//!
//! ```text
//! Idle -> HeaderWritten -> GeometryWritten -> MaterialsWritten
//!      -> TexturesWritten -> [SkinDataWritten] -> closed
//! ```
//!
//! Whether the skin block is required is only known from the header at
//! runtime; [`SceneWriter::finish`] and [`SceneWriter::write_skin`] check it.

use bytemuck::cast_slice;
use std::io::Write;
use std::marker::PhantomData;

use jj_common::{
    FormatError, MaterialRecord, SceneHeader, MATERIAL_ID_SIZE, MATERIAL_RECORD_SIZE,
    POSITION_SIZE, SHADE_SIZE, SKIN_INDICES_SIZE, SKIN_WEIGHTS_SIZE, TEXTURE_NAME_SIZE,
};

use crate::error::ExportError;

pub struct Idle;
pub struct HeaderWritten;
pub struct GeometryWritten;
pub struct MaterialsWritten;
pub struct TexturesWritten;
pub struct SkinDataWritten;

/// Scene file writer in state `S`
pub struct SceneWriter<W: Write, S> {
    writer: W,
    header: SceneHeader,
    _state: PhantomData<S>,
}

impl<W: Write, S> SceneWriter<W, S> {
    fn advance<T>(self) -> SceneWriter<W, T> {
        SceneWriter {
            writer: self.writer,
            header: self.header,
            _state: PhantomData,
        }
    }

    fn write_block(&mut self, bytes: &[u8]) -> Result<(), ExportError> {
        self.writer.write_all(bytes)?;
        Ok(())
    }
}

fn check_len(block: &'static str, expected: usize, actual: usize) -> Result<(), FormatError> {
    if expected != actual {
        return Err(FormatError::LengthMismatch {
            block,
            expected,
            actual,
        });
    }
    Ok(())
}

impl<W: Write> SceneWriter<W, Idle> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header: SceneHeader::new(0, 0, 0, false),
            _state: PhantomData,
        }
    }

    pub fn write_header(
        mut self,
        header: SceneHeader,
    ) -> Result<SceneWriter<W, HeaderWritten>, ExportError> {
        self.header = header;
        self.write_block(&header.to_bytes())?;
        Ok(self.advance())
    }
}

impl<W: Write> SceneWriter<W, HeaderWritten> {
    /// Positions and shading records per corner, then material ids per triangle
    pub fn write_geometry(
        mut self,
        positions: &[[f32; 3]],
        shade: &[[f32; 5]],
        material_ids: &[u16],
    ) -> Result<SceneWriter<W, GeometryWritten>, ExportError> {
        let corners = self.header.corner_count();
        let triangles = self.header.triangle_count as usize;
        check_len("position", corners, positions.len())?;
        check_len("shade", corners, shade.len())?;
        check_len("material id", triangles, material_ids.len())?;

        let mut block = Vec::with_capacity(
            corners * (POSITION_SIZE + SHADE_SIZE) + triangles * MATERIAL_ID_SIZE,
        );
        for value in cast_slice::<_, f32>(positions) {
            block.extend_from_slice(&value.to_le_bytes());
        }
        for value in cast_slice::<_, f32>(shade) {
            block.extend_from_slice(&value.to_le_bytes());
        }
        for id in material_ids {
            block.extend_from_slice(&id.to_le_bytes());
        }
        self.write_block(&block)?;
        Ok(self.advance())
    }
}

impl<W: Write> SceneWriter<W, GeometryWritten> {
    pub fn write_materials(
        mut self,
        records: &[MaterialRecord],
    ) -> Result<SceneWriter<W, MaterialsWritten>, ExportError> {
        check_len("material", self.header.material_count as usize, records.len())?;

        let mut block = Vec::with_capacity(records.len() * MATERIAL_RECORD_SIZE);
        for record in records {
            block.extend_from_slice(&record.to_bytes());
        }
        self.write_block(&block)?;
        Ok(self.advance())
    }
}

impl<W: Write> SceneWriter<W, MaterialsWritten> {
    /// Pre-encoded texture name fields
    pub fn write_textures(
        mut self,
        names: &[[u8; TEXTURE_NAME_SIZE]],
    ) -> Result<SceneWriter<W, TexturesWritten>, ExportError> {
        check_len("texture", self.header.texture_count as usize, names.len())?;

        self.write_block(names.concat().as_slice())?;
        Ok(self.advance())
    }
}

impl<W: Write> SceneWriter<W, TexturesWritten> {
    /// Bone indices then bone weights, both per corner
    pub fn write_skin(
        mut self,
        indices: &[[u32; 4]],
        weights: &[[f32; 4]],
    ) -> Result<SceneWriter<W, SkinDataWritten>, ExportError> {
        if !self.header.has_skin_data {
            return Err(FormatError::UnexpectedSkinData.into());
        }
        let corners = self.header.corner_count();
        check_len("bone index", corners, indices.len())?;
        check_len("bone weight", corners, weights.len())?;

        let mut block = Vec::with_capacity(corners * (SKIN_INDICES_SIZE + SKIN_WEIGHTS_SIZE));
        for value in cast_slice::<_, u32>(indices) {
            block.extend_from_slice(&value.to_le_bytes());
        }
        for value in cast_slice::<_, f32>(weights) {
            block.extend_from_slice(&value.to_le_bytes());
        }
        self.write_block(&block)?;
        Ok(self.advance())
    }

    /// Close a file whose header declares no skin data
    pub fn finish(mut self) -> Result<W, ExportError> {
        if self.header.has_skin_data {
            return Err(FormatError::MissingSkinData.into());
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> SceneWriter<W, SkinDataWritten> {
    pub fn finish(mut self) -> Result<W, ExportError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
