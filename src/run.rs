//! Orchestration: CLI → Index Lifecycle → optional Reindex Deleter → Tree
//! Walker Pool → Batch Dispatcher → wait for drain → Rollup Driver → wait
//! for drain → Index Lifecycle restore.
//!
//! Threads the search-engine client, broker client, and config through as
//! one explicit context value instead of process-wide globals.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::broker::client::JobBroker;
use crate::index::client::SearchIndexClient;
use crate::index::lifecycle::{self, ExistingIndexPolicy};
use crate::index::scroll::ScrollOptions;
use crate::index::{bulk::BulkWriterConfig, bulk::BulkWriter, reindex, rollup};
use crate::model::{Backend, CrawlConfig, CrawlState, CrawlstatDoc, DiskspaceDoc, RunArgs};
use crate::progress::{wait_for_drain, Phase, ProgressReporter};
use crate::utils::now_iso8601;
use crate::walker::dispatcher::{BatchDispatcher, BatchDispatcherConfig};
use crate::walker::exclude::ExclusionFilter;
use crate::walker::pool::{CancellationToken, WalkerPool};
use crate::walker::reader::{AgentDirReader, DirReader, HttpApiDirReader, LocalDirReader};

/// Explicit context bundling the external collaborators and read-only
/// run-time state, passed through instead of process-wide globals.
pub struct RuntimeContext<'a> {
    pub index_client: &'a dyn SearchIndexClient,
    pub broker: &'a dyn JobBroker,
    pub crawl_config: &'a CrawlConfig,
    pub cancel: CancellationToken,
}

pub fn run(ctx: &RuntimeContext, run_args: &RunArgs) -> Result<()> {
    let progress = ProgressReporter::new();
    let started = Instant::now();

    let policy = if run_args.forcedropexisting {
        ExistingIndexPolicy::ForceDrop
    } else {
        ExistingIndexPolicy::Prompt
    };

    if !run_args.dircalcsonly {
        lifecycle::ensure_index(
            ctx.index_client,
            &run_args.index,
            &ctx.crawl_config.searchindex,
            run_args.reindex || run_args.reindexrecursive,
            policy,
        )?;
        lifecycle::tune_for_crawl(ctx.index_client, &run_args.index, &ctx.crawl_config.searchindex)?;

        write_crawlstat(ctx, run_args, CrawlState::Running, started)?;
        write_diskspace(ctx, run_args)?;

        if run_args.reindex || run_args.reindexrecursive {
            progress.set_phase(Phase::Reindexing);
            let carryover = reindex::delete_path(
                ctx.index_client,
                &run_args.index,
                &run_args.rootdir,
                run_args.reindexrecursive,
                ctx.crawl_config.searchindex.chunk_size,
            )?;
            info!(
                files = carryover.files.len(),
                dirs = carryover.directories.len(),
                "reindex carryover captured"
            );
        }

        if !run_args.nowait {
            wait_for_drain(ctx.broker, &ctx.cancel)?;
        }

        progress.set_phase(Phase::Crawling);
        run_crawl_phase(ctx, run_args)?;

        progress.set_phase(Phase::DrainingCrawlQueue);
        wait_for_drain(ctx.broker, &ctx.cancel)?;

        write_crawlstat(ctx, run_args, CrawlState::FinishedCrawl, started)?;
    }

    progress.set_phase(Phase::RollingUp);
    let rollup_opts = ScrollOptions {
        path_scope: Some(run_args.rootdir.clone()),
        max_depth: if run_args.maxdcdepth == u32::MAX {
            None
        } else {
            Some((root_depth(&run_args.rootdir), run_args.maxdcdepth))
        },
        descending_sort: true,
    };
    let rollup_config = rollup::RollupDriverConfig {
        scroll_size: ctx.crawl_config.searchindex.scrollsize,
        batchsize: ctx.crawl_config.adaptivebatch.startsize,
        adaptive: run_args.adaptivebatch,
        startsize: ctx.crawl_config.adaptivebatch.startsize,
        maxsize: ctx.crawl_config.adaptivebatch.adaptivebatch_maxsize,
        stepsize: ctx.crawl_config.adaptivebatch.stepsize,
    };
    rollup::run(
        ctx.index_client,
        ctx.broker,
        &run_args.index,
        &rollup_opts,
        rollup_config,
    )?;

    progress.set_phase(Phase::DrainingRollupQueue);
    wait_for_drain(ctx.broker, &ctx.cancel)?;

    write_crawlstat(ctx, run_args, CrawlState::FinishedDircalc, started)?;

    progress.set_phase(Phase::Restoring);
    lifecycle::restore_after_crawl(
        ctx.index_client,
        &run_args.index,
        &ctx.crawl_config.searchindex,
        run_args.optimizeindex,
    )?;

    progress.set_phase(Phase::Completed);
    progress.finish();
    Ok(())
}

fn run_crawl_phase(ctx: &RuntimeContext, run_args: &RunArgs) -> Result<()> {
    let reader: Arc<dyn DirReader> = match run_args.backend {
        Backend::Local => Arc::new(LocalDirReader),
        Backend::CrawlApi => Arc::new(HttpApiDirReader::new(
            ctx.crawl_config
                .crawlapi
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
        )?),
        Backend::StorAgent => Arc::new(AgentDirReader::new(ctx.crawl_config.crawlapi.storagent_hosts.clone())?),
    };

    let filter = Arc::new(ExclusionFilter::new(
        &ctx.crawl_config
            .includes
            .dirs
            .union(&ctx.crawl_config.includes.files)
            .cloned()
            .collect(),
        &ctx.crawl_config
            .excludes
            .dirs
            .union(&ctx.crawl_config.excludes.files)
            .cloned()
            .collect(),
    ));

    let pool = WalkerPool::spawn(
        run_args.rootdir.clone(),
        run_args.effective_maxdepth(),
        run_args.walkthreads,
        reader,
        filter,
        run_args.chunkfiles,
        ctx.cancel.clone(),
    );

    let dispatcher_config = BatchDispatcherConfig {
        indexemptydirs: run_args.indexemptydirs,
        replacepath: ctx.crawl_config.paths.replacepath.clone(),
        batchsize: run_args.batchsize,
        adaptive: run_args.adaptivebatch,
        startsize: ctx.crawl_config.adaptivebatch.startsize,
        maxsize: ctx.crawl_config.adaptivebatch.adaptivebatch_maxsize,
        stepsize: ctx.crawl_config.adaptivebatch.stepsize,
        adaptivebatch_maxfiles: ctx.crawl_config.adaptivebatch.adaptivebatch_maxfiles,
    };
    let mut dispatcher = BatchDispatcher::new(dispatcher_config, ctx.broker);
    let enqueued = dispatcher.drain(pool.results())?;
    info!(jobs_enqueued = enqueued, "crawl phase enqueued jobs");
    pool.join();
    Ok(())
}

fn root_depth(rootdir: &str) -> u32 {
    rootdir.matches('/').count() as u32
}

fn write_crawlstat(ctx: &RuntimeContext, run_args: &RunArgs, state: CrawlState, started: Instant) -> Result<()> {
    let doc = CrawlstatDoc {
        path: run_args.rootdir.clone(),
        state,
        crawl_time: started.elapsed().as_secs_f64(),
        indexing_date: now_iso8601(),
    };
    let action = crate::index::client::BulkAction::Index {
        id: format!("crawlstat-{}-{:?}", run_args.rootdir, state),
        doc: serde_json::to_value(&doc)?,
    };
    let writer = BulkWriter::new(
        ctx.index_client,
        BulkWriterConfig {
            chunk_size: 1,
            splitfiles: false,
            wait_for_yellow: false,
        },
    );
    writer.bulk(&run_args.index, vec![action])
}

fn write_diskspace(ctx: &RuntimeContext, run_args: &RunArgs) -> Result<()> {
    let (total, free, available) = match fs2::total_space(std::path::Path::new(&run_args.rootdir))
        .and_then(|t| Ok((t, fs2::free_space(std::path::Path::new(&run_args.rootdir))?)))
        .and_then(|(t, f)| Ok((t, f, fs2::available_space(std::path::Path::new(&run_args.rootdir))?)))
    {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "could not probe disk space, writing zeroed diskspace doc");
            (0, 0, 0)
        }
    };
    let doc = DiskspaceDoc {
        path: run_args.rootdir.clone(),
        total,
        used: total.saturating_sub(free),
        free,
        available,
        indexing_date: now_iso8601(),
    };
    let action = crate::index::client::BulkAction::Index {
        id: format!("diskspace-{}", run_args.rootdir),
        doc: serde_json::to_value(&doc)?,
    };
    ctx.index_client.bulk(&run_args.index, vec![action])?;
    Ok(())
}
