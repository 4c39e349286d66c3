/*!
 * Boundary dataset output
 *
 * One polygon shapefile per container (`.shp`, `.shx`, `.dbf` with a
 * numeric `ID` field) plus a `.prj` declaring WGS84 geographic coordinates.
 */

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use tracing::{debug, warn};

use crate::config::ExtractConfig;
use crate::error::{FurrowError, Result};
use crate::projection::GeodeticPoint;

/// Projection definition written next to every dataset
pub const WGS84_WKT: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["Degree",0.017453292519943295]]"#;

/// Attribute field holding the feature id
pub const ID_FIELD: &str = "ID";

/// One output polygon
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u32,
    pub ring: Vec<GeodeticPoint>,
}

/// Receiver of decoded features for one container
pub trait FeatureSink {
    fn write_feature(&mut self, feature: &Feature) -> Result<()>;

    /// Flush and close the dataset; returns the number of features stored
    fn finish(&mut self) -> Result<usize>;
}

/// File locations of one boundary dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    pub shp: PathBuf,
    pub prj: PathBuf,
}

impl DatasetPaths {
    /// `<dir>/<stem><suffix>.shp|.prj` where stem is the container file name
    /// up to its first `.` and dir is the configured output directory or the
    /// container's own directory
    pub fn for_container(container: &Path, config: &ExtractConfig) -> Self {
        let file_name = container
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file_name.split('.').next().unwrap_or_default();

        let dir = config
            .output_dir
            .clone()
            .or_else(|| container.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        let base = dir.join(format!("{}{}", stem, config.output_suffix));
        Self {
            shp: base.with_extension("shp"),
            prj: base.with_extension("prj"),
        }
    }

    pub fn exists(&self) -> bool {
        self.shp.exists() || self.prj.exists()
    }

    pub fn shx(&self) -> PathBuf {
        self.shp.with_extension("shx")
    }

    pub fn dbf(&self) -> PathBuf {
        self.shp.with_extension("dbf")
    }
}

/// Writes features to a polygon shapefile
pub struct ShapefileSink {
    paths: DatasetPaths,
    writer: Option<shapefile::Writer<BufWriter<File>>>,
    prj: Option<File>,
    written: usize,
}

impl ShapefileSink {
    /// Create the dataset files.
    ///
    /// With `exclusive`, the `.prj` is created with create-new semantics so
    /// two runs racing on the same container cannot both write it; the
    /// loser gets [`io::ErrorKind::AlreadyExists`].
    pub fn create(paths: DatasetPaths, exclusive: bool) -> Result<Self> {
        if let Some(parent) = paths.shp.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let prj = if exclusive {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&paths.prj)?
        } else {
            File::create(&paths.prj)?
        };

        let writer = match Self::open_writer(&paths.shp) {
            Ok(writer) => writer,
            Err(e) => {
                // A lone .prj counts as an existing dataset
                drop(prj);
                remove_dataset(&paths);
                return Err(e);
            }
        };
        debug!("Created dataset {}", paths.shp.display());

        Ok(Self {
            paths,
            writer: Some(writer),
            prj: Some(prj),
            written: 0,
        })
    }

    fn open_writer(shp: &Path) -> Result<shapefile::Writer<BufWriter<File>>> {
        let id_field = FieldName::try_from(ID_FIELD)
            .map_err(|e| FurrowError::Output(format!("field name {}: {:?}", ID_FIELD, e)))?;
        let table = TableWriterBuilder::new().add_numeric_field(id_field, 10, 0);
        Ok(shapefile::Writer::from_path(shp, table)?)
    }

    pub fn paths(&self) -> &DatasetPaths {
        &self.paths
    }
}

impl FeatureSink for ShapefileSink {
    fn write_feature(&mut self, feature: &Feature) -> Result<()> {
        if feature.ring.is_empty() {
            warn!("Feature {} has no points, not written", feature.id);
            return Ok(());
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| FurrowError::Output("dataset already finished".to_string()))?;

        let points = feature
            .ring
            .iter()
            .map(|p| Point::new(p.lon, p.lat))
            .collect();
        let polygon = Polygon::new(PolygonRing::Outer(points));

        let mut record = Record::default();
        record.insert(
            ID_FIELD.to_string(),
            FieldValue::Numeric(Some(f64::from(feature.id))),
        );

        writer.write_shape_and_record(&polygon, &record)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<usize> {
        // Dropping the writer patches the .shp/.shx headers and flushes
        drop(self.writer.take());

        if let Some(mut prj) = self.prj.take() {
            prj.write_all(WGS84_WKT.as_bytes())?;
            prj.sync_all()?;
        }

        Ok(self.written)
    }
}

/// Remove whatever part of a dataset exists; used when writing fails midway
pub fn remove_dataset(paths: &DatasetPaths) {
    for path in [paths.shp.clone(), paths.shx(), paths.dbf(), paths.prj.clone()] {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
