use super::errors::{ErrorKind, Result};
use super::tokenizer::Tokenizer;
use failchain::ResultExt;
use log::{debug, info};
use math::{vec2, vec3, EulerAngles, Vec2f, Vec3f};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Default)]
pub struct Face {
    pub material_index: i32,
    pub face_type: u32,
    pub geometry_mode: i32,
    pub lighting_mode: i32,
    pub texture_mode: i32,
    pub extra_light: f32,
    pub vertex_indices: Vec<i32>,
    pub uv_indices: Vec<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: String,
    pub radius: f32,
    pub geometry_mode: i32,
    pub lighting_mode: i32,
    pub texture_mode: i32,
    pub vertices: Vec<Vec3f>,
    pub vertex_intensities: Vec<f32>,
    /// Pixel-space texture vertices.
    pub uvs: Vec<Vec2f>,
    pub faces: Vec<Face>,
}

/// Hierarchy node. Links are indices into `Model::nodes`, `-1` for none.
#[derive(Clone, Debug)]
pub struct Node {
    pub index: i32,
    pub flags: u32,
    pub node_type: u32,
    pub mesh_index: i32,
    pub parent_index: i32,
    pub child_index: i32,
    pub sibling_index: i32,
    pub child_count: i32,
    pub position: Vec3f,
    pub rotation: EulerAngles,
    pub pivot: Vec3f,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    pub materials: Vec<String>,
    pub radius: f32,
    pub insert_offset: Vec3f,
    /// Meshes of the first geometry set.
    pub meshes: Vec<Mesh>,
    /// Remaining geometry sets, lower detail levels of `meshes`.
    pub lod_geosets: Vec<Vec<Mesh>>,
    pub nodes: Vec<Node>,
}

impl Model {
    pub fn from_file<P: AsRef<Path>>(path: &P) -> Result<Model> {
        let path = path.as_ref();
        let bytes = fs::read(path).chain_err(|| ErrorKind::on_file_read(path))?;
        let name = path
            .file_stem()
            .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
        Model::from_text(&name, &String::from_utf8_lossy(&bytes))
    }

    pub fn from_text(name: &str, text: &str) -> Result<Model> {
        let mut model = Model {
            name: name.to_owned(),
            materials: Vec::new(),
            radius: 0.0,
            insert_offset: vec3(0.0, 0.0, 0.0),
            meshes: Vec::new(),
            lod_geosets: Vec::new(),
            nodes: Vec::new(),
        };
        let mut tokens = Tokenizer::new(name, text);
        while let Some(token) = tokens.next_token() {
            match token.to_ascii_lowercase().as_str() {
                "3do" => {
                    let version = tokens.next_float()?;
                    debug!("{}: format version {}", name, version);
                }
                "materials" => model.materials = read_materials(&mut tokens)?,
                "radius" => model.radius = tokens.next_float()?,
                "insert" => {
                    tokens.expect_keyword("offset")?;
                    model.insert_offset = read_vec3(&mut tokens)?;
                }
                "geosets" => {
                    let mut geosets = read_geosets(&mut tokens)?.into_iter();
                    model.meshes = geosets.next().unwrap_or_default();
                    model.lod_geosets = geosets.collect();
                }
                "hierarchy" => {
                    tokens.expect_keyword("nodes")?;
                    model.nodes = read_nodes(&mut tokens)?;
                }
                _ => {}
            }
        }

        info!("Loaded model '{}':", model.name);
        info!("    {:4} materials", model.materials.len());
        info!("    {:4} meshes", model.meshes.len());
        info!("    {:4} lower detail geosets", model.lod_geosets.len());
        info!("    {:4} nodes", model.nodes.len());
        Ok(model)
    }

    /// Arena index of a node's parent. Self-parented nodes and parents
    /// outside the arena attach to the root.
    pub fn node_parent(&self, index: usize) -> Option<usize> {
        let parent = self.nodes.get(index)?.parent_index;
        if parent < 0 || parent as usize == index || parent as usize >= self.nodes.len() {
            None
        } else {
            Some(parent as usize)
        }
    }

    pub fn node_mesh(&self, index: usize) -> Option<&Mesh> {
        let mesh = self.nodes.get(index)?.mesh_index;
        if mesh < 0 {
            None
        } else {
            self.meshes.get(mesh as usize)
        }
    }

    pub fn root_nodes(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&index| self.node_parent(index).is_none())
            .collect()
    }
}

fn read_vec3(tokens: &mut Tokenizer) -> Result<Vec3f> {
    Ok(vec3(
        tokens.next_float()?,
        tokens.next_float()?,
        tokens.next_float()?,
    ))
}

fn read_materials(tokens: &mut Tokenizer) -> Result<Vec<String>> {
    let count = tokens.next_count("material")?;
    let mut materials = Vec::new();
    for _ in 0..count {
        let _index = tokens.next_int()?;
        materials.push(tokens.next_word("material name")?.to_owned());
    }
    Ok(materials)
}

fn read_geosets(tokens: &mut Tokenizer) -> Result<Vec<Vec<Mesh>>> {
    let count = tokens.next_count("geoset")?;
    let mut geosets = Vec::new();
    for _ in 0..count {
        tokens.expect_keyword("geoset")?;
        let _index = tokens.next_int()?;
        tokens.expect_keyword("meshes")?;
        let num_meshes = tokens.next_count("mesh")?;
        let mut meshes = Vec::new();
        for _ in 0..num_meshes {
            meshes.push(read_mesh(tokens)?);
        }
        geosets.push(meshes);
    }
    Ok(geosets)
}

/// Whether the current mesh block ended without its face normals.
fn at_mesh_end(tokens: &mut Tokenizer) -> bool {
    match tokens.peek_token() {
        Some(token) => ["mesh", "geoset", "section", "hierarchy"]
            .iter()
            .any(|keyword| token.eq_ignore_ascii_case(keyword)),
        None => true,
    }
}

fn read_mesh(tokens: &mut Tokenizer) -> Result<Mesh> {
    tokens.expect_keyword("mesh")?;
    let _index = tokens.next_int()?;
    let mut mesh = Mesh::default();
    while !at_mesh_end(tokens) {
        let keyword = tokens.next_word("mesh field")?.to_ascii_lowercase();
        match keyword.as_str() {
            "name" => mesh.name = tokens.next_word("mesh name")?.to_owned(),
            "radius" => mesh.radius = tokens.next_float()?,
            "geometrymode" => mesh.geometry_mode = tokens.next_int()?,
            "lightingmode" => mesh.lighting_mode = tokens.next_int()?,
            "texturemode" => mesh.texture_mode = tokens.next_int()?,
            "vertices" => {
                let count = tokens.next_count("vertex")?;
                for _ in 0..count {
                    let _index = tokens.next_int()?;
                    mesh.vertices.push(read_vec3(tokens)?);
                    mesh.vertex_intensities.push(tokens.next_float()?);
                }
            }
            "texture" => {
                tokens.expect_keyword("vertices")?;
                let count = tokens.next_count("texture vertex")?;
                for _ in 0..count {
                    let _index = tokens.next_int()?;
                    mesh.uvs.push(vec2(tokens.next_float()?, tokens.next_float()?));
                }
            }
            "vertex" => {
                tokens.expect_keyword("normals")?;
                skip_normals(tokens, mesh.vertices.len())?;
            }
            "faces" => mesh.faces = read_faces(tokens)?,
            "face" => {
                tokens.expect_keyword("normals")?;
                skip_normals(tokens, mesh.faces.len())?;
                break;
            }
            _ => debug!(
                "{}:{}: unknown mesh field `{}`",
                tokens.file(),
                tokens.line(),
                keyword
            ),
        }
    }
    Ok(mesh)
}

fn skip_normals(tokens: &mut Tokenizer, count: usize) -> Result<()> {
    for _ in 0..count {
        let _index = tokens.next_int()?;
        read_vec3(tokens)?;
    }
    Ok(())
}

fn read_faces(tokens: &mut Tokenizer) -> Result<Vec<Face>> {
    let count = tokens.next_count("face")?;
    let mut faces = Vec::new();
    for _ in 0..count {
        let _index = tokens.next_int()?;
        let material_index = tokens.next_int()?;
        let face_type = tokens.next_hex()?;
        let geometry_mode = tokens.next_int()?;
        let lighting_mode = tokens.next_int()?;
        let texture_mode = tokens.next_int()?;
        let extra_light = tokens.next_float()?;
        let num_corners = tokens.next_count("face vertex")?;
        let mut vertex_indices = Vec::new();
        let mut uv_indices = Vec::new();
        for _ in 0..num_corners {
            let (vertex, uv) = tokens.next_corner()?;
            vertex_indices.push(vertex);
            uv_indices.push(uv);
        }
        faces.push(Face {
            material_index,
            face_type,
            geometry_mode,
            lighting_mode,
            texture_mode,
            extra_light,
            vertex_indices,
            uv_indices,
        });
    }
    Ok(faces)
}

fn read_nodes(tokens: &mut Tokenizer) -> Result<Vec<Node>> {
    let count = tokens.next_count("hierarchy node")?;
    let mut nodes = Vec::new();
    for _ in 0..count {
        let index = tokens.next_int()?;
        let flags = tokens.next_hex()?;
        let node_type = tokens.next_hex()?;
        let mesh_index = tokens.next_int()?;
        let parent_index = tokens.next_int()?;
        let child_index = tokens.next_int()?;
        let sibling_index = tokens.next_int()?;
        let child_count = tokens.next_int()?;
        let position = read_vec3(tokens)?;
        let rotation = EulerAngles::new(
            tokens.next_float()?,
            tokens.next_float()?,
            tokens.next_float()?,
        );
        let pivot = read_vec3(tokens)?;
        let name = tokens.next_word("node name")?.to_owned();
        nodes.push(Node {
            index,
            flags,
            node_type,
            mesh_index,
            parent_index,
            child_index,
            sibling_index,
            child_count,
            position,
            rotation,
            pivot,
            name,
        });
    }
    Ok(nodes)
}

#[cfg(test)]
pub(crate) mod test {
    use super::Model;
    use math::{vec2, vec3};

    pub(crate) const MODEL: &str = r#"
# Sample model
SECTION: HEADER
3DO 2.1

SECTION: MODELRESOURCE
MATERIALS 2
     0:    body.mat
     1:    head.mat

SECTION: GEOMETRYDEF
RADIUS 0.25
INSERT OFFSET 0.0 0.0 0.1
GEOSETS 2

GEOSET 0
MESHES 2

MESH 0
NAME torso
RADIUS 0.2
GEOMETRYMODE 4
LIGHTINGMODE 3
TEXTUREMODE 3

VERTICES 4
# num:  x:  y:  z:  i:
    0:  0.0 0.0 0.0  0.0
    1:  1.0 0.0 0.0  0.0
    2:  1.0 1.0 0.0  0.5
    3:  0.0 1.0 0.0  0.0

TEXTURE VERTICES 3
    0:  0.0 0.0
    1:  32.0 0.0
    2:  32.0 32.0

VERTEX NORMALS
    0:  0.0 0.0 1.0
    1:  0.0 0.0 1.0
    2:  0.0 0.0 1.0
    3:  0.0 0.0 1.0

FACES 2
# num: material: type: geo: light: tex: extralight: verts:
    0:  0  0x0  4  3  3  0.0  4  0,0 1,1 2,2 3,0
    1:  1  0x1  4  3  3  0.1  3  0,0 2,1 3,2

FACE NORMALS
    0:  0.0 0.0 1.0
    1:  0.0 0.0 1.0

MESH 1
NAME head
VERTICES 1
    0:  0.0 0.0 2.0  0.0
FACES 0

GEOSET 1
MESHES 1

MESH 0
NAME torso_low
VERTICES 0
FACES 0
FACE NORMALS

SECTION: HIERARCHYDEF
HIERARCHY NODES 3
# num: flags: type: mesh: parent: child: sibling: numChildren: x: y: z: pitch: yaw: roll: pivotx: pivoty: pivotz: hnodename:
    0:  0x0  0x1   0  -1   1  -1  1  0.0 0.0 0.0  0.0 0.0 0.0  0.0 0.0 0.0  root
    1:  0x0  0x2   1   0  -1   2  0  0.0 0.0 1.0  10.0 20.0 30.0  0.0 0.0 0.5  neck
    2:  0x0  0x2   7   2  -1  -1  0  0.5 0.0 0.0  0.0 0.0 0.0  0.0 0.0 0.0  loose
"#;

    #[test]
    fn test_model() {
        let model = Model::from_text("test", MODEL).expect("test: model did not parse");
        assert_eq!(model.materials, vec!["body.mat".to_owned(), "head.mat".to_owned()]);
        assert_eq!(model.radius, 0.25);
        assert_eq!(model.insert_offset, vec3(0.0, 0.0, 0.1));

        assert_eq!(model.meshes.len(), 2);
        let torso = &model.meshes[0];
        assert_eq!(torso.name, "torso");
        assert_eq!(torso.radius, 0.2);
        assert_eq!(torso.texture_mode, 3);
        assert_eq!(torso.vertices.len(), 4);
        assert_eq!(torso.vertex_intensities[2], 0.5);
        assert_eq!(torso.uvs[2], vec2(32.0, 32.0));
        assert_eq!(torso.faces.len(), 2);
        assert_eq!(torso.faces[0].vertex_indices, vec![0, 1, 2, 3]);
        assert_eq!(torso.faces[0].uv_indices, vec![0, 1, 2, 0]);
        assert_eq!(torso.faces[1].material_index, 1);
        assert_eq!(torso.faces[1].face_type, 1);
        assert_eq!(torso.faces[1].extra_light, 0.1);

        let head = &model.meshes[1];
        assert_eq!(head.name, "head");
        assert_eq!(head.vertices, vec![vec3(0.0, 0.0, 2.0)]);
        assert!(head.faces.is_empty());

        assert_eq!(model.lod_geosets.len(), 1);
        assert_eq!(model.lod_geosets[0][0].name, "torso_low");

        assert_eq!(model.nodes.len(), 3);
        let neck = &model.nodes[1];
        assert_eq!(neck.name, "neck");
        assert_eq!(neck.node_type, 2);
        assert_eq!(neck.sibling_index, 2);
        assert_eq!(neck.position, vec3(0.0, 0.0, 1.0));
        assert_eq!(neck.rotation.pitch, 10.0);
        assert_eq!(neck.rotation.yaw, 20.0);
        assert_eq!(neck.rotation.roll, 30.0);
        assert_eq!(neck.pivot, vec3(0.0, 0.0, 0.5));
    }

    #[test]
    fn test_node_arena() {
        let model = Model::from_text("test", MODEL).expect("test: model did not parse");
        assert_eq!(model.node_parent(0), None);
        assert_eq!(model.node_parent(1), Some(0));
        // Self-parented.
        assert_eq!(model.node_parent(2), None);
        assert_eq!(model.node_parent(3), None);
        assert_eq!(model.root_nodes(), vec![0, 2]);

        assert_eq!(model.node_mesh(0).map(|mesh| mesh.name.as_str()), Some("torso"));
        assert_eq!(model.node_mesh(1).map(|mesh| mesh.name.as_str()), Some("head"));
        assert!(model.node_mesh(2).is_none());
    }

    #[test]
    fn test_truncated_model_fails() {
        let truncated = &MODEL[..MODEL.find("    1:  1  0x1").expect("test: fixture changed")];
        assert!(Model::from_text("short", truncated).is_err());
        assert!(Model::from_text("nodes", "HIERARCHY NODES 1\n0: 0x0 0x1 0 -1").is_err());
        assert!(Model::from_text("offset", "INSERT 0.0 0.0 0.0").is_err());
    }

    #[test]
    fn test_mesh_blocks_in_any_order() {
        let text = "
GEOSETS 1
GEOSET 0
MESHES 1
MESH 0
NAME shuffled
FACES 1
    0:  0  0x0  4  3  3  0.0  3  0,2 1,1 2,0
LIGHTLEVEL 0.5
TEXTURE VERTICES 3
    0:  0.0 0.0
    1:  8.0 0.0
    2:  8.0 8.0
VERTICES 3
    0:  0.0 0.0 0.0  0.0
    1:  1.0 0.0 0.0  0.0
    2:  1.0 1.0 0.0  0.25
VERTEX NORMALS
    0:  0.0 0.0 1.0
    1:  0.0 0.0 1.0
    2:  0.0 0.0 1.0
FACE NORMALS
    0:  0.0 0.0 1.0
HIERARCHY NODES 1
    0:  0x0  0x1   0  -1  -1  -1  0  0.0 0.0 0.0  0.0 0.0 0.0  0.0 0.0 0.0  root
";
        let model = Model::from_text("shuffled", text).expect("test: model did not parse");
        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.name, "shuffled");
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.faces[0].vertex_indices, vec![0, 1, 2]);
        assert_eq!(mesh.faces[0].uv_indices, vec![2, 1, 0]);
        assert_eq!(mesh.uvs, vec![vec2(0.0, 0.0), vec2(8.0, 0.0), vec2(8.0, 8.0)]);
        assert_eq!(mesh.vertices[2], vec3(1.0, 1.0, 0.0));
        assert_eq!(mesh.vertex_intensities, vec![0.0, 0.0, 0.25]);
        assert_eq!(model.nodes.len(), 1);
        assert_eq!(model.nodes[0].name, "root");
    }

    #[test]
    fn test_huge_counts_fail_without_allocating() {
        let texts = [
            "MATERIALS 2000000000\n0: a.mat",
            "GEOSETS 2000000000\nGEOSET 0 MESHES 1\nMESH 0\nFACES 0\n",
            "GEOSETS 1\nGEOSET 0 MESHES 2000000000\nMESH 0\nFACES 0\n",
            "GEOSETS 1\nGEOSET 0 MESHES 1\nMESH 0\nVERTICES 2000000000\n0: 0 0 0 0",
            "GEOSETS 1\nGEOSET 0 MESHES 1\nMESH 0\nTEXTURE VERTICES 2000000000\n0: 0 0",
            "GEOSETS 1\nGEOSET 0 MESHES 1\nMESH 0\nFACES 2000000000\n",
            "GEOSETS 1\nGEOSET 0 MESHES 1\nMESH 0\nFACES 1\n0: 0 0x0 4 3 3 0.0 2000000000 0,0",
            "HIERARCHY NODES 2000000000\n",
        ];
        for text in &texts {
            assert!(Model::from_text("huge", text).is_err(), "{}", text);
        }
    }
}
