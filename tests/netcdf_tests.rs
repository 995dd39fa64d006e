//! Reading, writing and splitting real netCDF files

use ndarray::{Array1, Array2};
use netcdf::{create, open};
use splitvar::config::SplitConfig;
use splitvar::dataset::{StorageType, TemporalKind};
use splitvar::errors::{Result, SplitVarError};
use splitvar::netcdf_io::{open_dataset, write_dataset};
use splitvar::splitter::split_files;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const FILL: i16 = -999;

/// One year of daily noleap data starting `first_day` days after 2000-01-01
fn write_input(path: &Path, first_day: usize, steps: usize) -> Result<()> {
    let mut file = create(path)?;
    file.add_unlimited_dimension("time")?;
    file.add_dimension("lat", 2)?;
    file.add_dimension("nv", 2)?;

    file.add_attribute("title", "test_run")?;
    file.add_attribute("filename", path.display().to_string())?;

    {
        let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put(Array1::from(vec![-10.0, 10.0]).view(), ..)?;
    }
    {
        let mut area = file.add_variable::<f32>("area", &["lat"])?;
        area.put_attribute("long_name", "area of cells near lat")?;
        area.put(Array1::from(vec![1.0_f32, 2.0]).view(), ..)?;
    }

    let days: Vec<f64> = (first_day..first_day + steps).map(|d| d as f64).collect();
    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "days since 2000-01-01 00:00:00")?;
        time.put_attribute("calendar", "noleap")?;
        time.put_attribute("bounds", "time_bnds")?;
        time.put(Array1::from(days.clone()).view(), 0..steps)?;
    }
    {
        let mut bnds = file.add_variable::<f64>("time_bnds", &["time", "nv"])?;
        let values = Array2::from_shape_fn((steps, 2), |(i, j)| days[i] + j as f64);
        bnds.put(values.view(), (0..steps, 0..2))?;
    }
    {
        let mut temp = file.add_variable::<i16>("temp", &["time", "lat"])?;
        temp.put_attribute("_FillValue", FILL)?;
        temp.put_attribute("units", "degC")?;
        temp.put_attribute("cell_measures", "area: area")?;
        let values = Array2::from_shape_fn((steps, 2), |(i, j)| if i == 0 && j == 0 { FILL } else { (i % 30) as i16 });
        temp.put(values.view(), (0..steps, 0..2))?;
    }
    Ok(())
}

fn input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let first = dir.join("run_2001.nc");
    let second = dir.join("run_2000.nc");
    // Written out of order; opening sorts by the first time value
    write_input(&first, 365, 365)?;
    write_input(&second, 0, 365)?;
    Ok(vec![first, second])
}

#[test]
fn test_open_masks_fill_values_and_concatenates() -> Result<()> {
    let dir = tempdir()?;
    let inputs = input_files(dir.path())?;

    let ds = open_dataset(&inputs, None, &[])?;
    assert_eq!(ds.dimensions().get("time"), Some(&730));
    assert_eq!(ds.time_dim(), Some("time"));

    let time = ds.variable("time").expect("time is read");
    assert_eq!(time.data()[[0]], 0.0);
    assert_eq!(time.data()[[365]], 365.0);
    assert!(ds.is_coordinate("time"));
    assert!(ds.is_coordinate("lat"));
    assert!(!ds.is_coordinate("temp"));

    let temp = ds.variable("temp").expect("temp is read");
    assert!(temp.data()[[0, 0]].is_nan());
    assert!(temp.data()[[365, 0]].is_nan());
    assert_eq!(temp.data()[[1, 1]], 1.0);
    assert_eq!(temp.encoding().storage, StorageType::Short);
    assert_eq!(temp.encoding().fill_value, Some(f64::from(FILL)));
    assert!(!temp.attrs().contains_key("_FillValue"));

    assert_eq!(ds.variable("time_bnds").map(|v| v.kind()), Some(TemporalKind::Instant));
    assert_eq!(ds.variable("area").map(|v| v.encoding().storage), Some(StorageType::Float));
    Ok(())
}

#[test]
fn test_excluded_variables_are_not_read() -> Result<()> {
    let dir = tempdir()?;
    let inputs = input_files(dir.path())?;

    let ds = open_dataset(&inputs, None, &["area".to_string()])?;
    assert!(ds.variable("area").is_none());
    assert!(ds.variable("temp").is_some());
    Ok(())
}

#[test]
fn test_inconsistent_time_units_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let first = dir.path().join("a.nc");
    write_input(&first, 0, 10)?;

    let second = dir.path().join("b.nc");
    {
        let mut file = create(&second)?;
        file.add_dimension("time", 2)?;
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "hours since 2000-01-01")?;
        time.put(Array1::from(vec![0.0, 1.0]).view(), ..)?;
    }

    assert!(matches!(
        open_dataset(&[first, second], None, &[]),
        Err(SplitVarError::InconsistentTimeUnits { .. })
    ));
    Ok(())
}

#[test]
fn test_writer_restores_encoding() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.nc");
    write_input(&input, 0, 20)?;
    let ds = open_dataset(&[&input], None, &[])?;

    let output = dir.path().join("out.nc");
    write_dataset(&ds, &output, Some("time"))?;

    let file = open(&output)?;
    let time_dim = file.dimension("time").expect("time dimension written");
    assert!(time_dim.is_unlimited());
    assert_eq!(time_dim.len(), 20);

    let temp = file.variable("temp").expect("temp written");
    assert!(format!("{:?}", temp.vartype()).contains("16"));
    let values: Vec<i16> = temp.get_values::<i16, _>(..)?;
    assert_eq!(values[0], FILL);
    assert_eq!(values[3], 1);
    assert!(temp.attribute("_FillValue").is_some());
    assert!(temp.attribute("cell_measures").is_some());
    assert!(file.attribute("history").is_some());

    let reread = open_dataset(&[&output], None, &[])?;
    assert_eq!(reread.variable("temp").map(|v| v.encoding().storage), Some(StorageType::Short));
    assert!(reread.variable("temp").is_some_and(|v| v.data()[[0, 0]].is_nan()));
    Ok(())
}

#[test]
fn test_split_files_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let inputs = input_files(dir.path())?;
    let out = dir.path().join("out");

    let mut config = SplitConfig::new(inputs)
        .with_output_dir(&out)
        .with_simname("my_run");
    config.skip.push("lat".to_string());
    let summary = split_files(&config)?;

    assert_eq!(summary.chunks.get("temp"), Some(&2));
    // area only supports temp and is not exported on its own
    assert!(!summary.chunks.contains_key("area"));

    let var_dir = out.join("my-run").join("temp");
    let first = var_dir.join("temp_my-run_200001_200012.nc");
    let second = var_dir.join("temp_my-run_200101_200112.nc");
    assert_eq!(summary.outputs, vec![first.clone(), second]);

    let file = open(&first)?;
    for name in ["temp", "time", "time_bnds", "lat", "area"] {
        assert!(file.variable(name).is_some(), "{name} missing from chunk");
    }
    assert_eq!(file.dimension("time").map(|d| d.len()), Some(365));
    assert!(file.attribute("filename").is_none());
    assert!(file.attribute("time_coverage_start").is_some());
    assert!(file.attribute("geospatial_lat_min").is_some());
    assert!(file.attribute("geospatial_lon_min").is_none());

    let chunk = open_dataset(&[&first], None, &[])?;
    assert_eq!(chunk.attrs().get("title").and_then(|v| v.as_text()), Some("test-run"));
    assert_eq!(chunk.attrs().get("simname").and_then(|v| v.as_text()), Some("my-run"));
    assert_eq!(chunk.attrs().get("time_coverage_end").and_then(|v| v.as_text()), Some("200012"));
    assert_eq!(chunk.attrs().get("geospatial_lat_max").and_then(|v| v.as_f64()), Some(10.0));
    Ok(())
}

#[test]
fn test_split_with_aggregation() -> Result<()> {
    let dir = tempdir()?;
    let inputs = input_files(dir.path())?;
    let out = dir.path().join("out");

    let config = SplitConfig::new(inputs)
        .with_output_dir(&out)
        .with_variables(vec!["temp".to_string()])
        .with_frequency("12MS".parse()?)
        .with_aggregate("1MS".parse()?, splitvar::statistics::StatOperation::Mean);
    let summary = split_files(&config)?;
    assert_eq!(summary.total_chunks(), 2);

    let chunk = open_dataset(&[&summary.outputs[0]], None, &[])?;
    assert_eq!(chunk.dimensions().get("time"), Some(&12));
    let bnds = chunk.variable("time_bnds").expect("bounds kept");
    assert_eq!(bnds.data()[[0, 0]], 0.0);
    assert_eq!(bnds.data()[[0, 1]], 31.0);
    Ok(())
}

#[test]
fn test_frequency_finer_than_data_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let inputs = input_files(dir.path())?;
    let out = dir.path().join("out");

    let config = SplitConfig::new(inputs)
        .with_output_dir(&out)
        .with_frequency("H".parse()?);
    assert!(matches!(split_files(&config), Err(SplitVarError::FrequencyTooFine { .. })));
    assert!(!out.join("simname").join("temp").exists());
    Ok(())
}

#[test]
fn test_integer_storage_types_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("types.nc");
    // Seconds since 1900 pass i32::MAX after 1968
    let seconds: Vec<i64> = vec![3_155_673_600, 3_155_760_000, 3_155_846_400];
    {
        let mut file = create(&input)?;
        file.add_dimension("time", 3)?;

        let mut time = file.add_variable::<i64>("time", &["time"])?;
        time.put_attribute("units", "seconds since 1900-01-01")?;
        time.put(Array1::from(seconds.clone()).view(), ..)?;

        let mut mask = file.add_variable::<u8>("mask", &["time"])?;
        mask.put_attribute("_FillValue", 255_u8)?;
        mask.put(Array1::from(vec![200_u8, 255, 128]).view(), ..)?;

        let mut count = file.add_variable::<u16>("count", &["time"])?;
        count.put(Array1::from(vec![60_000_u16, 1, 65_000]).view(), ..)?;

        let mut cells = file.add_variable::<u32>("cells", &["time"])?;
        cells.put(Array1::from(vec![4_000_000_000_u32, 0, 7]).view(), ..)?;
    }

    let ds = open_dataset(&[&input], None, &[])?;
    let storage = |name: &str| ds.variable(name).map(|v| v.encoding().storage);
    assert_eq!(storage("time"), Some(StorageType::Int64));
    assert_eq!(storage("mask"), Some(StorageType::UByte));
    assert_eq!(storage("count"), Some(StorageType::UShort));
    assert_eq!(storage("cells"), Some(StorageType::UInt));
    assert!(ds.variable("mask").is_some_and(|v| v.data()[[1]].is_nan()));

    let output = dir.path().join("copy.nc");
    write_dataset(&ds, &output, None)?;
    let file = open(&output)?;

    let time = file.variable("time").expect("time written");
    assert_eq!(time.get_values::<i64, _>(..)?, seconds);
    let mask = file.variable("mask").expect("mask written");
    assert_eq!(mask.get_values::<u8, _>(..)?, vec![200, 255, 128]);
    let count = file.variable("count").expect("count written");
    assert_eq!(count.get_values::<u16, _>(..)?, vec![60_000, 1, 65_000]);
    let cells = file.variable("cells").expect("cells written");
    assert_eq!(cells.get_values::<u32, _>(..)?, vec![4_000_000_000, 0, 7]);
    Ok(())
}

#[test]
fn test_netcdf_error_display() {
    let err = SplitVarError::NetCDFError(netcdf::Error::NotFound("temp".to_string()));
    assert!(err.to_string().contains("NetCDF error"));
}
