//! Chunked loading of gridded NetCDF variables into flat columns.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};

/// Opens a NetCDF grid file, failing with a clear message when the path
/// does not exist.
pub fn open_grid(path: &Path) -> Result<netcdf::File> {
    if !path.exists() {
        bail!("grid file not found: {}", path.display());
    }

    netcdf::open(path).with_context(|| format!("cannot open grid file {}", path.display()))
}

/// Reads the named variable in bounded slices along its outermost dimension
/// and concatenates the flattened slices into one column. Fill values and
/// NaNs become `None`.
///
/// Vendor grids are (time, lat, lon); 1- and 2-dimensional variables are
/// handled too.
pub fn load_variable(
    file: &netcdf::File,
    name: &str,
    chunk_rows: usize,
) -> Result<Vec<Option<f32>>> {
    let var = file
        .variable(name)
        .ok_or_else(|| anyhow!("variable `{}` not found in grid file", name))?;

    let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    if dims.is_empty() || dims.len() > 3 {
        bail!("variable `{}` has unsupported rank {}", name, dims.len());
    }

    let fill = fill_value(&var);
    let outer = dims[0];
    let mut column = Vec::with_capacity(dims.iter().product());

    let mut start = 0;
    while start < outer {
        let end = (start + chunk_rows).min(outer);

        let slab: Vec<f64> = match dims.len() {
            1 => var.get_values::<f64, _>(start..end)?,
            2 => var.get_values::<f64, _>((start..end, 0..dims[1]))?,
            _ => var.get_values::<f64, _>((start..end, 0..dims[1], 0..dims[2]))?,
        };

        column.extend(slab.into_iter().map(|v| filter_fill(v, fill)));
        start = end;
    }

    Ok(column)
}

/// Finds the extracted `.nc` file for a variable code and year, e.g.
/// `Maize_DVS_C3S-glob-agric_2019_1_2019-...nc`.
pub fn find_grid_file(dir: &Path, code: &str, year: u16) -> Result<PathBuf> {
    let needle = format!("_{}_", code);
    let year_str = year.to_string();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if name.ends_with(".nc") && name.contains(&needle) && name.contains(&year_str) {
            return Ok(path);
        }
    }

    bail!(
        "no grid file for variable `{}` and year {} in {}",
        code,
        year,
        dir.display()
    )
}

fn filter_fill(value: f64, fill: Option<f64>) -> Option<f32> {
    if value.is_nan() {
        return None;
    }
    if fill == Some(value) {
        return None;
    }

    Some(value as f32)
}

fn fill_value(var: &netcdf::Variable) -> Option<f64> {
    for name in ["_FillValue", "missing_value"] {
        let Some(attribute) = var.attribute(name) else {
            continue;
        };
        let Ok(value) = attribute.value() else {
            continue;
        };

        match value {
            netcdf::AttributeValue::Float(v) => return Some(v as f64),
            netcdf::AttributeValue::Double(v) => return Some(v),
            netcdf::AttributeValue::Int(v) => return Some(v as f64),
            netcdf::AttributeValue::Short(v) => return Some(v as f64),
            _ => continue,
        }
    }

    None
}

// -- Tests -------------------------------------------------------------------
