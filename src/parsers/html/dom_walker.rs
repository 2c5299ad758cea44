//! DOM遍历器模块
//!
//! 本模块负责递归遍历节点子树，并为每个元素协调样式资源嵌入和元素资源嵌入。
//! 这是资源内联的核心组件。
//!
//! # 工作流程
//!
//! 对每个元素节点严格按顺序执行：
//!
//! 1. 嵌入内联样式中的背景与遮罩图片
//! 2. 嵌入元素自身引用的图片（`<img>`、SVG `<image>`）
//! 3. 并发处理所有子节点，等待全部完成
//!
//! 文档节点只遍历子节点；文本、注释等其他节点不做处理。
//!
//! # 并发模型
//!
//! 节点句柄基于 `Rc`，整个遍历在单线程上协作式并发执行：兄弟子树的 future
//! 交错推进，任何 `RefCell` 借用都不会跨越挂起点。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use monolith_embed::parsers::html::dom_walker::ImageEmbedder;
//!
//! let session = Rc::new(Session::new(options.clone())?);
//! let embedder = ImageEmbedder::new(
//!     session.clone(),
//!     CssResolver::new(session),
//!     ImageDecoder,
//!     options,
//! );
//! let report = embedder.run(&dom.document).await?;
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use futures::future::{join_all, try_join_all, FutureExt, LocalBoxFuture};
use markup5ever_rcdom::{Handle, NodeData};

use crate::core::{EmbedError, EmbedOptions, EmbedOutcome, EmbedReport, FanIn};
use crate::network::session::Fetcher;
use crate::parsers::css::Resolver;
use crate::parsers::image::Decoder;

use super::assets::embed_image_node;
use super::dom::{collect_children, get_node_name};
use super::element_handlers::ResourceElementRegistry;
use super::style::embed_style_resources;

/// 图片嵌入器
///
/// 持有遍历所需的全部协作者。获取器以 `Rc` 共享，默认配置下样式解析器
/// 使用的是同一个获取器。
///
/// 同一个实例可以多次调用 [`ImageEmbedder::run`]，统计结果会累加。
pub struct ImageEmbedder<F, R, D> {
    fetcher: Rc<F>,
    resolver: R,
    decoder: D,
    options: EmbedOptions,
    /// 资源元素注册表
    element_registry: ResourceElementRegistry,
    report: RefCell<EmbedReport>,
}

impl<F, R, D> ImageEmbedder<F, R, D>
where
    F: Fetcher,
    R: Resolver,
    D: Decoder,
{
    pub fn new(fetcher: Rc<F>, resolver: R, decoder: D, options: EmbedOptions) -> Self {
        ImageEmbedder {
            fetcher,
            resolver,
            decoder,
            options,
            element_registry: ResourceElementRegistry::new(),
            report: RefCell::new(EmbedReport::default()),
        }
    }

    /// 当前累计的统计结果
    pub fn report(&self) -> EmbedReport {
        self.report.borrow().clone()
    }

    /// 遍历以 `node` 为根的子树
    ///
    /// 根节点自身的样式解析错误和取消会返回给调用方；其余失败都已在各自的
    /// 节点或父节点汇合处被吸收，并体现在返回的统计结果中。
    pub async fn run(&self, node: &Handle) -> Result<EmbedReport, EmbedError> {
        let started = Instant::now();

        self.embed(node).await?;

        let report = self.report();
        tracing::info!(
            "资源嵌入完成: 访问 {} 个元素，嵌入 {}，跳过 {}，失败 {}，失败子树 {}，耗时 {:?}",
            report.nodes_visited,
            report.embedded,
            report.skipped,
            report.failed,
            report.failed_subtrees,
            started.elapsed()
        );

        Ok(report)
    }

    /// 处理单个节点及其子树
    ///
    /// 递归调用需要装箱；节点句柄不是 `Send`，所以使用本地 future。
    pub fn embed<'a>(&'a self, node: &'a Handle) -> LocalBoxFuture<'a, Result<(), EmbedError>> {
        async move {
            if self.options.cancel.is_cancelled() {
                return Err(EmbedError::Cancelled);
            }

            match node.data {
                NodeData::Document => self.embed_children(node).await,
                NodeData::Element { .. } => {
                    self.report.borrow_mut().nodes_visited += 1;

                    let outcomes =
                        embed_style_resources(node, &self.resolver, &self.options).await?;
                    self.record_all(&outcomes);

                    if let Some(outcome) = embed_image_node(
                        node,
                        &self.element_registry,
                        self.fetcher.as_ref(),
                        &self.decoder,
                        &self.options,
                    )
                    .await?
                    {
                        self.record_all(&[outcome]);
                    }

                    self.embed_children(node).await
                }
                // 文本、注释、文档类型和处理指令不携带资源
                _ => Ok(()),
            }
        }
        .boxed_local()
    }

    /// 并发处理所有子节点并汇合结果
    async fn embed_children(&self, node: &Handle) -> Result<(), EmbedError> {
        // 先取快照，挂起期间不持有 children 的借用
        let children = collect_children(node);
        if children.is_empty() {
            return Ok(());
        }

        match self.options.fan_in {
            FanIn::BestEffort => {
                let results = join_all(children.iter().map(|child| self.embed(child))).await;

                for (child, result) in children.iter().zip(results) {
                    match result {
                        Ok(()) => {}
                        Err(EmbedError::Cancelled) => return Err(EmbedError::Cancelled),
                        Err(error) => {
                            tracing::warn!(
                                "<{}> 子树处理失败，继续处理其余节点: {}",
                                get_node_name(child).unwrap_or_default(),
                                error
                            );
                            self.report.borrow_mut().failed_subtrees += 1;
                        }
                    }
                }

                Ok(())
            }
            FanIn::AllOrNothing => {
                try_join_all(children.iter().map(|child| self.embed(child))).await?;
                Ok(())
            }
        }
    }

    fn record_all(&self, outcomes: &[EmbedOutcome]) {
        let mut report = self.report.borrow_mut();
        for outcome in outcomes {
            report.record(outcome);
        }
    }
}
