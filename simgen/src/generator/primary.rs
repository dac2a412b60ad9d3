use std::path::Path;

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GeneratorError, Result};
use crate::generator::traits::{GeneratedParticle, Generator};
use crate::header::{InfoValue, McEventHeader, GENERATOR_DESCRIPTION, GENERATOR_ID};
use crate::pdg::{PdgTable, PDG_K0, PDG_K0_LONG, PDG_K0_SHORT};
use crate::stack::{McProcess, Stack, StackTrack};
use crate::status::is_encoded;
use crate::vertex::{InteractionDiamondParam, MeanVertexObject, VertexMode};

/// Identification of the generator setup, recorded in every event header.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryGeneratorParam {
    pub id: i64,
    pub description: String,
}

struct Embedding {
    file_name: String,
    headers: Vec<McEventHeader>,
    index: usize,
}

/// Runs a list of event generators and pushes their particles to a stack.
///
/// # Description
///
/// Every event gets one interaction vertex: an external vertex if one was
/// set for this event, otherwise a sample of the mean vertex chosen by the
/// vertex mode. When embedding, the vertex of the next background event is
/// used instead and the background events are cycled through in order.
///
/// Particles are shifted to the vertex, their mother and daughter indices
/// are offset by the number of tracks already on the stack when their
/// generator ran.
///
pub struct PrimaryGenerator {
    generators: Vec<Box<dyn Generator>>,
    param: PrimaryGeneratorParam,
    diamond: InteractionDiamondParam,
    pdg: PdgTable,
    rng: StdRng,
    vertex_mode: VertexMode,
    mean_vertex: Option<MeanVertexObject>,
    external_vertex: Option<Point3<f64>>,
    vertex: Point3<f64>,
    embedding: Option<Embedding>,
    do_tracking: bool,
    generator_id: i64,
    generator_description: String,
    n_tracks: usize,
    mc_index_offset: usize,
}

impl PrimaryGenerator {
    pub fn new(param: PrimaryGeneratorParam, seed: u64) -> Self {
        PrimaryGenerator {
            generators: Vec::new(),
            param,
            diamond: InteractionDiamondParam::default(),
            pdg: PdgTable::with_defaults(),
            rng: StdRng::seed_from_u64(seed),
            vertex_mode: VertexMode::default(),
            mean_vertex: None,
            external_vertex: None,
            vertex: Point3::origin(),
            embedding: None,
            do_tracking: true,
            generator_id: -1,
            generator_description: String::new(),
            n_tracks: 0,
            mc_index_offset: 0,
        }
    }

    pub fn with_diamond(mut self, diamond: InteractionDiamondParam) -> Self {
        self.diamond = diamond;
        self
    }

    pub fn with_pdg_table(mut self, pdg: PdgTable) -> Self {
        self.pdg = pdg;
        self
    }

    pub fn add_generator(&mut self, generator: Box<dyn Generator>) {
        self.generators.push(generator);
    }

    pub fn set_do_tracking(&mut self, do_tracking: bool) {
        self.do_tracking = do_tracking;
    }

    /// Vertex of the last generated event.
    pub fn vertex(&self) -> Point3<f64> {
        self.vertex
    }

    pub fn generator_id(&self) -> i64 {
        self.generator_id
    }

    pub fn generator_description(&self) -> &str {
        &self.generator_description
    }

    pub fn embedding_index(&self) -> Option<usize> {
        self.embedding.as_ref().map(|e| e.index)
    }

    pub fn init(&mut self) {
        info!("initialising primary generator");
        self.generator_id = self.param.id;
        self.generator_description = self.param.description.clone();
        if let Some(embedding) = &self.embedding {
            info!(file = %embedding.file_name, events = embedding.headers.len(), "embedding");
        }
    }

    /// Uses `(x, y, z)` as the vertex of the next event only.
    pub fn set_external_vertex_for_next_event(&mut self, x: f64, y: f64, z: f64) {
        self.external_vertex = Some(Point3::new(x, y, z));
    }

    /// Selects the vertex source. `mean_vertex` is required for [`VertexMode::Ccdb`].
    pub fn set_vertex_mode(&mut self, mode: VertexMode, mean_vertex: Option<&MeanVertexObject>) -> Result<()> {
        self.vertex_mode = mode;
        if mode == VertexMode::Ccdb {
            let mv = mean_vertex.ok_or(GeneratorError::MissingMeanVertex)?;
            info!(?mv, "mean vertex set");
            self.mean_vertex = Some(mv.clone());
        }
        Ok(())
    }

    fn fix_interaction_vertex(&mut self) -> Result<()> {
        if let Some(vertex) = self.external_vertex.take() {
            self.vertex = vertex;
            return Ok(());
        }
        let mean_vertex = match self.mean_vertex.take() {
            Some(mv) => mv,
            None => match self.vertex_mode {
                VertexMode::DiamondParam => MeanVertexObject::from_diamond(&self.diamond),
                VertexMode::NoVertex => MeanVertexObject::default(),
                VertexMode::Ccdb => return Err(GeneratorError::MissingMeanVertex),
            },
        };
        self.vertex = mean_vertex.sample(&mut self.rng);
        self.mean_vertex = Some(mean_vertex);
        debug!(x = self.vertex.x, y = self.vertex.y, z = self.vertex.z, "sampled interaction vertex");
        Ok(())
    }

    fn set_generator_information(&self, header: &mut McEventHeader) {
        header.put_info(GENERATOR_ID, InfoValue::Int(self.generator_id));
        header.put_info(GENERATOR_DESCRIPTION, InfoValue::Str(self.generator_description.clone()));
    }

    fn run_generators(&mut self, stack: &mut dyn Stack) -> Result<()> {
        self.n_tracks = 0;
        let mut generators = std::mem::take(&mut self.generators);
        let result = self.push_generated(&mut generators, stack);
        self.generators = generators;
        result
    }

    fn push_generated(&mut self, generators: &mut [Box<dyn Generator>], stack: &mut dyn Stack) -> Result<()> {
        for generator in generators.iter_mut() {
            self.mc_index_offset = self.n_tracks;
            for particle in generator.read_event()? {
                self.add_track(stack, particle)?;
            }
        }
        Ok(())
    }

    /// Generates one event into `stack` and fills `header`.
    pub fn generate_event(&mut self, stack: &mut dyn Stack, header: &mut McEventHeader) -> Result<()> {
        let background = self.embedding.as_ref().map(|e| e.headers[e.index].clone());
        let Some(background) = background else {
            self.fix_interaction_vertex()?;
            self.run_generators(stack)?;
            header.set_vertex(&self.vertex);
            header.n_primaries = self.n_tracks;
            self.set_generator_information(header);
            return Ok(());
        };

        self.vertex = background.vertex();
        for generator in self.generators.iter_mut() {
            generator.notify_embedding(&background);
        }
        self.run_generators(stack)?;
        header.set_vertex(&self.vertex);
        header.n_primaries = self.n_tracks;
        self.set_generator_information(header);
        if let Some(embedding) = self.embedding.as_mut() {
            header.embedding_file_name = Some(embedding.file_name.clone());
            header.embedding_event_index = Some(embedding.index);
            embedding.index = (embedding.index + 1) % embedding.headers.len();
        }
        Ok(())
    }

    /// Pushes one generated particle to the stack.
    ///
    /// # Description
    ///
    /// The particle is moved to the event vertex and its relatives are
    /// shifted by the current index offset. Particles unknown to the PDG
    /// table are not tracked, tracked K0 are converted into K0S or K0L with
    /// equal probability and a negative energy is computed from the mass.
    ///
    pub fn add_track(&mut self, stack: &mut dyn Stack, particle: GeneratedParticle) -> Result<()> {
        if !is_encoded(particle.status) && particle.process == McProcess::Primary {
            return Err(GeneratorError::StatusNotEncoded(particle.status));
        }
        let vertex = [
            particle.vertex[0] + self.vertex.x,
            particle.vertex[1] + self.vertex.y,
            particle.vertex[2] + self.vertex.z,
        ];

        let mass = self.pdg.mass(particle.pdg);
        let mut want_tracking = particle.want_tracking;
        if want_tracking && mass.is_none() {
            warn!(pdg = particle.pdg, "particle to be tracked is not defined in the PDG table");
            want_tracking = false;
        }
        let do_tracking = self.do_tracking && want_tracking;

        let offset = self.mc_index_offset;
        let shift = |index: Option<usize>| index.map(|i| i + offset);

        let mut pdg = particle.pdg;
        if pdg.abs() == PDG_K0 && do_tracking {
            warn!("K0 requested for tracking, converting into K0S/K0L");
            pdg = if self.rng.gen::<f64>() < 0.5 { PDG_K0_SHORT } else { PDG_K0_LONG };
        }

        let [px, py, pz] = particle.momentum;
        let energy = if particle.energy < 0.0 {
            let m = mass.unwrap_or(0.0);
            (m * m + px * px + py * py + pz * pz).sqrt()
        } else {
            particle.energy
        };

        stack.push_track(StackTrack {
            do_tracking,
            pdg,
            momentum: particle.momentum,
            energy,
            vertex,
            tof: particle.tof,
            weight: particle.weight,
            status: particle.status,
            mother1: shift(particle.mother1),
            mother2: shift(particle.mother2),
            daughter1: shift(particle.daughter1),
            daughter2: shift(particle.daughter2),
            process: particle.process,
        });
        self.n_tracks += 1;
        Ok(())
    }

    /// Generates the next events on top of the background events stored in `path`
    /// (a JSON list of event headers).
    pub fn embed_into(&mut self, path: &Path) -> Result<()> {
        if let Some(embedding) = &self.embedding {
            return Err(GeneratorError::AlreadyEmbedding(embedding.file_name.clone()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|source| GeneratorError::EmbeddingFile { path: path.to_path_buf(), source })?;
        let headers: Vec<McEventHeader> = serde_json::from_str(&content)
            .map_err(|source| GeneratorError::EmbeddingFormat { path: path.to_path_buf(), source })?;
        if headers.is_empty() {
            return Err(GeneratorError::NoEmbeddingEvents(path.to_path_buf()));
        }
        self.embedding = Some(Embedding { file_name: path.display().to_string(), headers, index: 0 });
        Ok(())
    }
}
