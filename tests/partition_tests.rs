//! Splitting time series into calendar periods

use ndarray::{Array1, Array2};
use splitvar::calendar::TimeAxis;
use splitvar::config::SplitConfig;
use splitvar::dataset::{Dataset, Variable};
use splitvar::errors::{Result, SplitVarError};
use splitvar::frequency::Frequency;
use splitvar::partition::{group_by_time, group_variable_by_time};
use splitvar::splitter::split_dataset;
use tempfile::tempdir;

// 2000-02-23 is day 53 of 2000 in every calendar
const FIRST_DAY: f64 = 53.0;

/// Daily `tmin(time, location)` from 2000-02-23 through 2003-09-13
fn daily_dataset(calendar: &str, steps: usize) -> Result<Dataset> {
    sampled_dataset(calendar, "days since 2000-01-01", FIRST_DAY, 1.0, steps)
}

fn sampled_dataset(calendar: &str, units: &str, start: f64, step: f64, steps: usize) -> Result<Dataset> {
    let offsets = Array1::from_iter((0..steps).map(|i| start + step * i as f64));
    let time = Variable::new("time", &["time"], offsets.into_dyn())?
        .with_attribute("units", units)
        .with_attribute("calendar", calendar);
    let tmin = Variable::new("tmin", &["time", "location"], Array2::<f64>::zeros((steps, 3)).into_dyn())?;
    let location = Variable::new("location", &["location"], Array1::from(vec![0.0, 1.0, 2.0]).into_dyn())?;

    Dataset::new()
        .coordinate_added(time)?
        .coordinate_added(location)?
        .variable_added(tmin)
}

fn group_sizes(ds: &Dataset, alias: &str) -> Result<Vec<usize>> {
    let freq: Frequency = alias.parse()?;
    Ok(group_by_time(ds, &freq)?
        .map(|chunk| chunk.variable("tmin").map_or(0, |v| v.shape()[0]))
        .collect())
}

const MONTHLY: [usize; 44] = [
    7, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31, 31, 28, 31,
    30, 31, 30, 31, 31, 30, 31, 30, 31, 31, 28, 31, 30, 31, 30, 31, 31, 13,
];

#[test]
fn test_daily_standard_calendar_groups() -> Result<()> {
    let ds = daily_dataset("standard", 1299)?;

    assert_eq!(group_sizes(&ds, "12MS")?, vec![344, 365, 365, 225]);
    assert_eq!(group_sizes(&ds, "24MS")?, vec![709, 590]);
    assert_eq!(group_sizes(&ds, "1MS")?, MONTHLY.to_vec());
    assert_eq!(group_sizes(&ds, "6MS")?, vec![160, 184, 181, 184, 181, 184, 181, 44]);

    let mut five_daily = vec![5; 1299 / 5];
    five_daily.push(1299 % 5);
    assert_eq!(group_sizes(&ds, "5D")?, five_daily);

    Ok(())
}

#[test]
fn test_year_alias_groups_by_calendar_year() -> Result<()> {
    let ds = daily_dataset("standard", 1299)?;
    // 2000-02-23..2000-12-31, full 2001 and 2002, 2003-01-01..2003-09-13
    assert_eq!(group_sizes(&ds, "time.year")?, vec![313, 365, 365, 256]);
    Ok(())
}

#[test]
fn test_noleap_calendar_groups() -> Result<()> {
    // No February 29 in 2000, one day fewer than the standard series
    let ds = daily_dataset("noleap", 1298)?;
    assert_eq!(group_sizes(&ds, "12MS")?, vec![343, 365, 365, 225]);

    let months = group_sizes(&ds, "1MS")?;
    assert_eq!(months[0], 6);
    assert_eq!(months[12], 28);
    Ok(())
}

#[test]
fn test_360_day_calendar_groups() -> Result<()> {
    // Two years of twelve 30-day months, February 29 and 30 included
    let ds = sampled_dataset("360_day", "days since 2000-01-01", 0.0, 1.0, 720)?;
    assert_eq!(group_sizes(&ds, "1MS")?, vec![30; 24]);
    assert_eq!(group_sizes(&ds, "12MS")?, vec![360, 360]);
    assert_eq!(group_sizes(&ds, "time.year")?, vec![360, 360]);
    assert_eq!(group_sizes(&ds, "7D")?.len(), 103);

    let chunks: Vec<Dataset> = group_by_time(&ds, &"1MS".parse()?)?.collect();
    let february = chunks[1].time_axis()?;
    assert_eq!(february.values.last().map(|t| (t.month, t.day)), Some((2, 30)));
    Ok(())
}

#[test]
fn test_all_leap_calendar_groups() -> Result<()> {
    // 2001 is not a Gregorian leap year but still has February 29 here
    let ds = sampled_dataset("all_leap", "days since 2001-01-01", 0.0, 1.0, 366 * 2)?;
    let year = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let both_years: Vec<usize> = year.iter().chain(year.iter()).copied().collect();
    assert_eq!(group_sizes(&ds, "1MS")?, both_years);
    assert_eq!(group_sizes(&ds, "12MS")?, vec![366, 366]);
    Ok(())
}

#[test]
fn test_six_hourly_groups() -> Result<()> {
    let ds = sampled_dataset("standard", "hours since 2000-01-01", FIRST_DAY * 24.0, 6.0, 1299 * 4)?;

    assert_eq!(group_sizes(&ds, "12MS")?, vec![344 * 4, 365 * 4, 365 * 4, 225 * 4]);
    let monthly: Vec<usize> = MONTHLY.iter().map(|n| n * 4).collect();
    assert_eq!(group_sizes(&ds, "1MS")?, monthly);
    Ok(())
}

#[test]
fn test_frequency_finer_than_data_is_rejected() -> Result<()> {
    let ds = daily_dataset("standard", 1299)?;
    let hourly: Frequency = "H".parse()?;

    match group_by_time(&ds, &hourly) {
        Err(SplitVarError::FrequencyTooFine { frequency, data_interval }) => {
            assert_eq!(frequency, "H");
            assert_eq!(data_interval.num_days(), 1);
        }
        other => panic!("expected FrequencyTooFine, got {other:?}"),
    }

    let err = group_by_time(&ds, &hourly).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Split frequency (H) is higher than data frequency (1 days 00:00:00): not supported"
    );
    Ok(())
}

#[test]
fn test_chunks_cover_the_series_exactly() -> Result<()> {
    let ds = daily_dataset("noleap", 1298)?;
    let freq: Frequency = "5D".parse()?;

    let mut expected_start = FIRST_DAY;
    let mut total = 0;
    for chunk in group_by_time(&ds, &freq)? {
        let time = chunk.variable("time").expect("time is carried into every chunk");
        assert_eq!(time.data()[[0]], expected_start);
        assert_eq!(chunk.variable("location").map(|v| v.shape()[0]), Some(3));
        expected_start += time.shape()[0] as f64;
        total += time.shape()[0];
    }
    assert_eq!(total, 1298);
    Ok(())
}

#[test]
fn test_variable_grouping_keeps_attributes() -> Result<()> {
    let ds = daily_dataset("standard", 1299)?;
    let tmin = ds
        .variable("tmin")
        .expect("fixture has tmin")
        .clone()
        .with_attribute("units", "K");
    let axis: TimeAxis = ds.time_axis()?;
    let freq: Frequency = "24MS".parse()?;

    let pieces: Vec<Variable> = group_variable_by_time(&tmin, &axis, &freq)?.collect();
    assert_eq!(pieces.len(), 2);
    assert_eq!(pieces[0].shape(), &[709, 3]);
    assert!(pieces.iter().all(|p| p.attrs() == tmin.attrs()));

    let location = ds.variable("location").expect("fixture has location");
    assert!(matches!(
        group_variable_by_time(location, &axis, &freq),
        Err(SplitVarError::DimensionNotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_missing_time_coordinate() -> Result<()> {
    let ds = Dataset::new().variable_added(Variable::new("x", &["n"], Array1::zeros(4).into_dyn())?)?;
    let freq: Frequency = "1D".parse()?;
    assert!(matches!(group_by_time(&ds, &freq), Err(SplitVarError::NoTimeCoordinate)));
    Ok(())
}

#[test]
fn test_split_without_time_coordinate_fails() -> Result<()> {
    let dir = tempdir()?;
    let ds = Dataset::new().variable_added(Variable::new("tmin", &["x"], Array1::zeros(4).into_dyn())?)?;
    let config = SplitConfig::new(Vec::new()).with_output_dir(dir.path());

    assert!(matches!(split_dataset(&ds, &config), Err(SplitVarError::NoTimeCoordinate)));
    assert!(!dir.path().join("simname").exists());
    Ok(())
}
