//! GLSL compilation and program reflection on top of naga.
//!
//! Compiling a stage parses and validates it. Linking checks the interface
//! between the vertex and fragment stage and merges their resource bindings
//! into a [`ProgramLayout`] that uniform uploads and draws are resolved against.

use std::collections::BTreeMap;

use naga::{AddressSpace, Binding, Handle, Module, ScalarKind, Type, TypeInner};

use crate::{
    backend::ShaderStage,
    pipelines::uniform::{ScalarClass, UniformShape},
};

/// Highest vertex input location the [`Vertex`](crate::data_structures::model::Vertex) layout provides.
pub const MAX_VERTEX_LOCATION: u32 = 4;

#[derive(Debug)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub module: Module,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    /// `None` for members that cannot be set through a uniform setter (arrays, structs).
    pub shape: Option<UniformShape>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceKind {
    UniformBlock {
        block: Option<String>,
        size: u32,
        members: Vec<UniformMember>,
    },
    Texture,
    Sampler,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Every resource binding of a linked program, ordered by group then binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramLayout {
    pub resources: Vec<Resource>,
}

impl ProgramLayout {
    /// Find a uniform block member by `member`, `instance.member` or `Block.member`.
    pub fn uniform(&self, name: &str) -> Option<(&Resource, &UniformMember)> {
        let (qualifier, member_name) = match name.split_once('.') {
            Some((qualifier, member)) => (Some(qualifier), member),
            None => (None, name),
        };
        self.resources.iter().find_map(|resource| {
            let ResourceKind::UniformBlock { block, members, .. } = &resource.kind else {
                return None;
            };
            if let Some(qualifier) = qualifier {
                if qualifier != resource.name && Some(qualifier) != block.as_deref() {
                    return None;
                }
            }
            members
                .iter()
                .find(|member| member.name == member_name)
                .map(|member| (resource, member))
        })
    }

    /// Bind groups the program uses, ascending.
    pub fn groups(&self) -> Vec<u32> {
        let mut groups: Vec<u32> = self.resources.iter().map(|r| r.group).collect();
        groups.dedup();
        groups
    }

    pub fn resources_in(&self, group: u32) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.group == group)
    }
}

/// Parse and validate one GLSL stage.
pub fn compile_glsl(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
        ShaderStage::Geometry => {
            return Err("geometry shaders are not supported by the wgpu backend".to_string());
        }
    };
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(naga_stage), source)
        .map_err(|e| e.emit_to_string(source))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| e.emit_to_string(source))?;
    Ok(CompiledStage { stage, module })
}

/// Check the stage interface and merge resource bindings.
pub fn link(stages: &[CompiledStage]) -> Result<ProgramLayout, String> {
    let mut errors = Vec::new();
    let vertex = stages.iter().find(|s| s.stage == ShaderStage::Vertex);
    let fragment = stages.iter().find(|s| s.stage == ShaderStage::Fragment);
    let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
        if vertex.is_none() {
            errors.push("no compiled vertex stage was attached".to_string());
        }
        if fragment.is_none() {
            errors.push("no compiled fragment stage was attached".to_string());
        }
        return Err(errors.join("\n"));
    };

    for (location, io) in io_locations(&vertex.module, naga::ShaderStage::Vertex, true) {
        if location > MAX_VERTEX_LOCATION {
            errors.push(format!(
                "vertex input at location {location} is not provided by the vertex layout"
            ));
        } else if io.kind != ScalarKind::Float {
            errors.push(format!("vertex input at location {location} must be a float type"));
        }
    }

    let vertex_outputs: BTreeMap<u32, IoType> =
        io_locations(&vertex.module, naga::ShaderStage::Vertex, false)
            .into_iter()
            .collect();
    for (location, io) in io_locations(&fragment.module, naga::ShaderStage::Fragment, true) {
        match vertex_outputs.get(&location) {
            None => errors.push(format!(
                "fragment input at location {location} is not written by the vertex stage"
            )),
            Some(output) if *output != io => errors.push(format!(
                "fragment input at location {location} does not match the vertex output type"
            )),
            Some(_) => {}
        }
    }

    let mut merged: BTreeMap<(u32, u32), Resource> = BTreeMap::new();
    for stage in [vertex, fragment] {
        for resource in reflect_resources(&stage.module) {
            let key = (resource.group, resource.binding);
            match merged.get(&key) {
                Some(existing) if existing.kind != resource.kind => errors.push(format!(
                    "binding {} in group {} is declared differently across stages",
                    resource.binding, resource.group
                )),
                Some(_) => {}
                None => {
                    merged.insert(key, resource);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(ProgramLayout {
            resources: merged.into_values().collect(),
        })
    } else {
        Err(errors.join("\n"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IoType {
    kind: ScalarKind,
    width: u8,
    components: u8,
}

fn io_type(inner: &TypeInner) -> Option<IoType> {
    match inner {
        TypeInner::Scalar(scalar) => Some(IoType {
            kind: scalar.kind,
            width: scalar.width,
            components: 1,
        }),
        TypeInner::Vector { size, scalar } => Some(IoType {
            kind: scalar.kind,
            width: scalar.width,
            components: *size as u8,
        }),
        _ => None,
    }
}

/// User-defined locations of an entry point's inputs or outputs.
fn io_locations(module: &Module, stage: naga::ShaderStage, inputs: bool) -> Vec<(u32, IoType)> {
    let mut out = Vec::new();
    let Some(entry) = module.entry_points.iter().find(|ep| ep.stage == stage) else {
        return out;
    };
    if inputs {
        for argument in &entry.function.arguments {
            collect_locations(module, argument.ty, argument.binding.as_ref(), &mut out);
        }
    } else if let Some(result) = &entry.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<(u32, IoType)>,
) {
    let inner = &module.types[ty].inner;
    match binding {
        Some(Binding::Location { location, .. }) => {
            if let Some(io) = io_type(inner) {
                out.push((*location, io));
            }
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn scalar_class(kind: ScalarKind) -> Option<ScalarClass> {
    match kind {
        ScalarKind::Float => Some(ScalarClass::Float),
        ScalarKind::Sint | ScalarKind::Uint | ScalarKind::Bool => Some(ScalarClass::Integer),
        _ => None,
    }
}

fn uniform_shape(inner: &TypeInner) -> Option<UniformShape> {
    match inner {
        TypeInner::Scalar(scalar) if scalar.width == 4 => {
            Some(UniformShape::new(scalar_class(scalar.kind)?, 1, 1))
        }
        TypeInner::Vector { size, scalar } if scalar.width == 4 => {
            Some(UniformShape::new(scalar_class(scalar.kind)?, 1, *size as u8))
        }
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if scalar.width == 4 => Some(UniformShape::new(
            scalar_class(scalar.kind)?,
            *columns as u8,
            *rows as u8,
        )),
        _ => None,
    }
}

fn reflect_resources(module: &Module) -> Vec<Resource> {
    module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            let binding = var.binding.as_ref()?;
            let ty = &module.types[var.ty];
            let name = var.name.clone().unwrap_or_default();
            let kind = match (var.space, &ty.inner) {
                (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                    ResourceKind::UniformBlock {
                        block: ty.name.clone(),
                        size: *span,
                        members: members
                            .iter()
                            .map(|member| UniformMember {
                                name: member.name.clone().unwrap_or_default(),
                                offset: member.offset,
                                shape: uniform_shape(&module.types[member.ty].inner),
                            })
                            .collect(),
                    }
                }
                (AddressSpace::Uniform, inner) => {
                    let shape = uniform_shape(inner);
                    ResourceKind::UniformBlock {
                        block: None,
                        size: shape.map_or(0, |s| s.size() as u32),
                        members: vec![UniformMember {
                            name: name.clone(),
                            offset: 0,
                            shape,
                        }],
                    }
                }
                (AddressSpace::Handle, TypeInner::Image { .. }) => ResourceKind::Texture,
                (AddressSpace::Handle, TypeInner::Sampler { .. }) => ResourceKind::Sampler,
                _ => return None,
            };
            Some(Resource {
                name,
                group: binding.group,
                binding: binding.binding,
                kind,
            })
        })
        .collect()
}
